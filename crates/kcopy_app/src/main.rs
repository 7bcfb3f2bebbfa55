use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use kcopy_app::cli::{credentials_from_env, Cli, Command};
use kcopy_app::report::{copy_summary, exit_code, pdf_summary, EXIT_CONFIG};
use kcopy_engine::{CopyOrchestrator, CopyRequest, PdfPoller};
use kcopy_logging::{kcopy_error, kcopy_info, kcopy_warn, LogDestination};
use tokio_util::sync::CancellationToken;

fn main() -> ExitCode {
    let cli = Cli::parse();
    kcopy_logging::initialize(cli.log_level(), LogDestination::Both(cli.log_file.clone()));

    let result = kcopy_app::runtime()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(run(cli)));
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            kcopy_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let cancel = CancellationToken::new();

    let code = match &cli.command {
        Command::CopyModules {
            headless,
            from,
            to,
            module_ids,
        } => {
            // Checked before anything touches the network.
            let credentials = credentials_from_env()?;
            spawn_interrupt_handler(cancel.clone());
            let request = CopyRequest {
                from_url: from.clone(),
                to_url: to.clone(),
                module_ids: module_ids.clone(),
                headless: *headless,
                credentials,
            };
            let results = CopyOrchestrator::with_defaults(cli.copy_config())
                .copy_modules(&request, cancel.clone())
                .await;
            println!("{}", copy_summary(&results));
            exit_code(results.iter().all(|r| r.is_published()), cancel.is_cancelled())
        }
        Command::DownloadPdfs {
            server,
            collection_ids,
        } => {
            spawn_interrupt_handler(cancel.clone());
            let results = PdfPoller::with_defaults(cli.pdf_settings())
                .download_pdfs(server, collection_ids, cancel.clone())
                .await;
            println!("{}", pdf_summary(&results));
            exit_code(results.iter().all(|r| r.outcome.is_ok()), cancel.is_cancelled())
        }
    };

    kcopy_info!("finished with exit code {}", code);
    Ok(code)
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            kcopy_warn!("interrupted; stopping at the next step");
            cancel.cancel();
        }
    });
}
