mod support;

use std::sync::Arc;
use std::time::Duration;

use kcopy_core::PublishFailure;
use kcopy_engine::{
    CopyConfig, CopyError, CopyOrchestrator, CopyRequest, FetchSettings, PublishOutcome,
    ReqwestFetcher,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{as_refs, credentials, export_entries, zip_bytes, FakeLauncher, Script};

async fn serve_module(server: &MockServer, module_id: &str, title: Option<&str>) {
    let page = match title {
        Some(title) => format!(
            r#"<html><body><h1 class="title" id="cnx_content_title">{title}</h1></body></html>"#
        ),
        None => "<html><body><h1>Untitled</h1></body></html>".to_string(),
    };
    Mock::given(method("GET"))
        .and(path(format!("/content/{module_id}/latest")))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
    let export_calls: u64 = if title.is_some() { 1 } else { 0 };
    Mock::given(method("GET"))
        .and(path(format!("/content/{module_id}/latest/module_export")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(zip_bytes(&as_refs(&export_entries(module_id)))),
        )
        .expect(export_calls)
        .mount(server)
        .await;
}

fn orchestrator(temp: &TempDir, launcher: &FakeLauncher, workers: usize) -> CopyOrchestrator {
    let mut config = CopyConfig::default_with_download_dir(temp.path().join("downloads"));
    config.retry.backoff = Duration::ZERO;
    config.publish_workers = workers;
    CopyOrchestrator::new(
        config,
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Arc::new(launcher.clone()),
    )
}

fn request(server: &MockServer, ids: &[&str]) -> CopyRequest {
    CopyRequest {
        from_url: server.uri(),
        to_url: "https://target".to_string(),
        module_ids: ids.iter().map(|id| id.to_string()).collect(),
        headless: true,
        credentials: credentials(),
    }
}

#[tokio::test]
async fn batch_reports_one_result_per_module_with_isolated_failures() {
    kcopy_logging::initialize_for_tests();
    let server = MockServer::start().await;
    serve_module(&server, "m100", Some("Intro to Systems")).await;
    serve_module(&server, "m200", None).await;
    serve_module(&server, "m300", Some("Flaky Publish")).await;
    serve_module(&server, "m400", Some("Always Broken")).await;

    let launcher = FakeLauncher::new();
    launcher
        .script(
            "Intro to Systems",
            Script {
                published_url: "https://target/content/m100-new/latest".to_string(),
                ..Script::default()
            },
        )
        .script(
            "Flaky Publish",
            Script {
                site_errors: 2,
                published_url: "https://target/content/m300-new/latest".to_string(),
                ..Script::default()
            },
        )
        .script(
            "Always Broken",
            Script {
                site_errors: 3,
                ..Script::default()
            },
        );

    let temp = TempDir::new().unwrap();
    let results = orchestrator(&temp, &launcher, 5)
        .copy_modules(
            &request(&server, &["m100", "m200", "m300", "m400"]),
            CancellationToken::new(),
        )
        .await;

    let ids: Vec<_> = results.iter().map(|r| r.module_id.as_str()).collect();
    assert_eq!(ids, vec!["m100", "m200", "m300", "m400"]);

    assert_eq!(
        results[0].published_url(),
        Some("https://target/content/m100-new/latest")
    );
    assert!(matches!(
        results[1].failure(),
        Some(CopyError::TitleNotFound { .. })
    ));
    assert_eq!(
        results[2].published_url(),
        Some("https://target/content/m300-new/latest")
    );
    assert_eq!(launcher.record("Flaky Publish").confirm_attempts, 3);
    assert!(matches!(
        results[3].failure(),
        Some(CopyError::Publish(PublishFailure::RetriesExhausted { attempts: 3 }))
    ));

    // m200 never reached the publish phase.
    assert_eq!(launcher.launches(), 3);
    assert_eq!(launcher.closes(), 3);
}

#[tokio::test]
async fn download_failure_does_not_block_siblings() {
    let server = MockServer::start().await;
    serve_module(&server, "m1", Some("One")).await;
    serve_module(&server, "m3", Some("Three")).await;
    Mock::given(method("GET"))
        .and(path("/content/m2/latest"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let launcher = FakeLauncher::new();
    let temp = TempDir::new().unwrap();
    let results = orchestrator(&temp, &launcher, 5)
        .copy_modules(&request(&server, &["m1", "m2", "m3"]), CancellationToken::new())
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_published());
    assert!(matches!(results[1].failure(), Some(CopyError::Fetch(_))));
    assert!(results[2].is_published());
}

#[tokio::test]
async fn concurrent_sessions_never_exceed_worker_limit() {
    let server = MockServer::start().await;
    let ids: Vec<String> = (1..=6).map(|n| format!("m{n}")).collect();
    for id in &ids {
        serve_module(&server, id, Some(&format!("Title {id}"))).await;
    }

    let launcher = FakeLauncher::new();
    launcher.with_step_delay(Duration::from_millis(20));
    let temp = TempDir::new().unwrap();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let results = orchestrator(&temp, &launcher, 2)
        .copy_modules(&request(&server, &id_refs), CancellationToken::new())
        .await;

    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.is_published()));
    assert!(launcher.max_active() <= 2);
    assert_eq!(launcher.closes(), 6);
}

#[tokio::test]
async fn duplicate_ids_are_reported_not_downloaded_twice() {
    let server = MockServer::start().await;
    serve_module(&server, "m1", Some("One")).await;

    let launcher = FakeLauncher::new();
    let temp = TempDir::new().unwrap();
    let results = orchestrator(&temp, &launcher, 5)
        .copy_modules(&request(&server, &["m1", "m1"]), CancellationToken::new())
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_published());
    assert!(matches!(
        results[1].failure(),
        Some(CopyError::DuplicateModule { .. })
    ));
}

#[tokio::test]
async fn cancelled_run_fails_every_module_without_browsers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let launcher = FakeLauncher::new();
    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let results = orchestrator(&temp, &launcher, 5)
        .copy_modules(&request(&server, &["m1", "m2"]), cancel)
        .await;

    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| matches!(r.outcome, PublishOutcome::Failed(CopyError::Cancelled))));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn cancelled_download_removes_partial_bundle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/content/m1/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<h1 id="cnx_content_title">Slow Export</h1>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/m1/latest/module_export"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let downloads = temp.path().join("downloads");
    std::fs::create_dir_all(&downloads).unwrap();
    let partial = downloads.join("m1.zip.part");
    std::fs::write(&partial, b"half a zip").unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let launcher = FakeLauncher::new();
    let results = orchestrator(&temp, &launcher, 5)
        .copy_modules(&request(&server, &["m1"]), cancel)
        .await;

    assert!(matches!(
        results[0].outcome,
        PublishOutcome::Failed(CopyError::Cancelled)
    ));
    assert!(!partial.exists());
    assert!(!downloads.join("m1.zip").exists());
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn panicking_publish_reports_lost_worker_and_spares_siblings() {
    let server = MockServer::start().await;
    serve_module(&server, "m1", Some("Crashes")).await;
    serve_module(&server, "m2", Some("Survives")).await;

    let launcher = FakeLauncher::new();
    launcher.script(
        "Crashes",
        Script {
            panic_on_confirm: true,
            ..Script::default()
        },
    );
    let temp = TempDir::new().unwrap();
    let results = orchestrator(&temp, &launcher, 1)
        .copy_modules(&request(&server, &["m1", "m2"]), CancellationToken::new())
        .await;

    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0].failure(),
        Some(CopyError::WorkerLost { module_id }) if module_id == "m1"
    ));
    assert!(results[1].is_published());
    // The crashed session is still closed while unwinding.
    assert_eq!(launcher.closes(), 2);
}
