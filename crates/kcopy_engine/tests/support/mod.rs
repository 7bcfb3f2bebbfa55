#![allow(dead_code)]
//! Scripted stand-in for the browser: behaves per module title.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use kcopy_core::Confirmation;
use kcopy_engine::{BrowserLauncher, Credentials, DriverError, LegacyUi, UiError};

pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Confirmation submissions that render a site error before success.
    pub site_errors: u32,
    /// Title shown on the published page; defaults to the submitted title.
    pub published_title: Option<String>,
    pub published_url: String,
    pub missing_publish_button: bool,
    pub upload_timeout: bool,
    /// The browser session panics when asked to confirm.
    pub panic_on_confirm: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Record {
    pub confirm_attempts: u32,
    pub back_navigations: u32,
    pub uploaded: Vec<PathBuf>,
}

#[derive(Default)]
struct Shared {
    scripts: Mutex<HashMap<String, Script>>,
    records: Mutex<HashMap<String, Record>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    launches: AtomicUsize,
    closes: AtomicUsize,
    step_delay: Mutex<Duration>,
    fail_launch: Mutex<bool>,
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    shared: Arc<Shared>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, title: &str, script: Script) -> &Self {
        self.shared
            .scripts
            .lock()
            .unwrap()
            .insert(title.to_string(), script);
        self
    }

    pub fn with_step_delay(&self, delay: Duration) -> &Self {
        *self.shared.step_delay.lock().unwrap() = delay;
        self
    }

    pub fn failing_launch(&self) -> &Self {
        *self.shared.fail_launch.lock().unwrap() = true;
        self
    }

    pub fn record(&self, title: &str) -> Record {
        self.shared
            .records
            .lock()
            .unwrap()
            .get(title)
            .cloned()
            .unwrap_or_default()
    }

    pub fn launches(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.shared.max_active.load(Ordering::SeqCst)
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self, target_url: &str, _headless: bool) -> Result<Box<dyn LegacyUi>, DriverError> {
        if *self.shared.fail_launch.lock().unwrap() {
            return Err(DriverError::Transport(format!(
                "connection refused for {target_url}"
            )));
        }
        self.shared.launches.fetch_add(1, Ordering::SeqCst);
        let now = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(FakeUi {
            shared: Arc::clone(&self.shared),
            title: None,
            confirmations: 0,
            closed: false,
        }))
    }
}

struct FakeUi {
    shared: Arc<Shared>,
    title: Option<String>,
    confirmations: u32,
    closed: bool,
}

impl FakeUi {
    fn pause(&self) {
        let delay = *self.shared.step_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn script(&self) -> Script {
        let title = self.title.clone().unwrap_or_default();
        self.shared
            .scripts
            .lock()
            .unwrap()
            .get(&title)
            .cloned()
            .unwrap_or_default()
    }

    fn with_record(&self, f: impl FnOnce(&mut Record)) {
        let title = self.title.clone().unwrap_or_default();
        let mut records = self.shared.records.lock().unwrap();
        f(records.entry(title).or_default());
    }
}

impl LegacyUi for FakeUi {
    fn login(&mut self, credentials: &Credentials) -> Result<bool, UiError> {
        self.pause();
        Ok(credentials.password == PASSWORD)
    }

    fn accept_license(&mut self) -> Result<(), UiError> {
        self.pause();
        Ok(())
    }

    fn fill_metadata(&mut self, title: &str) -> Result<String, UiError> {
        self.pause();
        self.title = Some(title.to_string());
        Ok("https://target/GroupWorkspaces/draft".to_string())
    }

    fn upload_bundle(&mut self, bundle: &Path) -> Result<(), UiError> {
        self.pause();
        if self.script().upload_timeout {
            return Err(UiError::Timeout {
                waiting_for: "import form".to_string(),
            });
        }
        let bundle = bundle.to_path_buf();
        self.with_record(|record| record.uploaded.push(bundle));
        Ok(())
    }

    fn request_publish(&mut self) -> Result<(), UiError> {
        self.pause();
        if self.script().missing_publish_button {
            return Err(UiError::MissingElement {
                element: "publish button".to_string(),
            });
        }
        Ok(())
    }

    fn confirm_publish(&mut self) -> Result<Confirmation, UiError> {
        self.pause();
        if self.script().panic_on_confirm {
            panic!("browser crashed while confirming");
        }
        self.confirmations += 1;
        self.with_record(|record| record.confirm_attempts += 1);
        let script = self.script();
        if self.confirmations <= script.site_errors {
            return Ok(Confirmation::SiteError);
        }
        Ok(Confirmation::Published {
            title: script
                .published_title
                .unwrap_or_else(|| self.title.clone().unwrap_or_default()),
            url: script.published_url,
        })
    }

    fn navigate_back(&mut self) -> Result<(), UiError> {
        self.with_record(|record| record.back_navigations += 1);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.active.fetch_sub(1, Ordering::SeqCst);
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("editor", PASSWORD)
}

/// Zip archive bytes holding `entries` (name, content).
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_bundle(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, zip_bytes(entries)).unwrap();
    path
}

pub fn export_entries(module_id: &str) -> Vec<(String, String)> {
    vec![
        (format!("{module_id}/"), String::new()),
        (format!("{module_id}/index.cnxml"), "<document/>".to_string()),
        (format!("{module_id}/index.cnxml.html"), "<html/>".to_string()),
        (format!("{module_id}/figure.png"), "png".to_string()),
    ]
}

pub fn as_refs(entries: &[(String, String)]) -> Vec<(&str, &str)> {
    entries
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_str()))
        .collect()
}
