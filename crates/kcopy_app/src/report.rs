use std::fmt::Write;

use kcopy_engine::{PdfResult, PublishResult};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURES: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn exit_code(all_succeeded: bool, interrupted: bool) -> u8 {
    if interrupted {
        EXIT_INTERRUPTED
    } else if all_succeeded {
        EXIT_OK
    } else {
        EXIT_FAILURES
    }
}

/// One line per module, followed by a count of published modules.
pub fn copy_summary(results: &[PublishResult]) -> String {
    let mut out = String::new();
    for result in results {
        match (result.published_url(), result.failure()) {
            (Some(url), _) => {
                let _ = writeln!(out, "{}: published {}", result.module_id, url);
            }
            (None, Some(err)) => {
                let _ = writeln!(out, "{}: FAILED {}", result.module_id, err);
            }
            (None, None) => {}
        }
    }
    let published = results.iter().filter(|r| r.is_published()).count();
    let _ = write!(out, "{published}/{} module(s) published", results.len());
    out
}

pub fn pdf_summary(results: &[PdfResult]) -> String {
    let mut out = String::new();
    for result in results {
        match &result.outcome {
            Ok(path) => {
                let _ = writeln!(out, "{}: saved {}", result.collection_id, path.display());
            }
            Err(err) => {
                let _ = writeln!(out, "{}: FAILED {}", result.collection_id, err);
            }
        }
    }
    let saved = results.iter().filter(|r| r.outcome.is_ok()).count();
    let _ = write!(out, "{saved}/{} pdf(s) downloaded", results.len());
    out
}
