use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use kcopy_core::Confirmation;
use kcopy_logging::kcopy_debug;

use crate::config::BrowserSettings;
use crate::driver::{BrowserLauncher, DriverError, LegacyUi, UiError};
use crate::webdriver::{ElementRef, WebDriverSession};
use crate::Credentials;

/// Structural locators for the legacy server's forms.
mod locators {
    pub const LOGIN_FORM: &str = "form#login_form";
    pub const LOGIN_USERNAME: &str = "input[name='__ac_name']";
    pub const LOGIN_PASSWORD: &str = "input[name='__ac_password']";
    pub const LOGIN_ERROR: &str = ".portalMessage.error, dl.error";
    pub const LOGGED_IN: &str = "#portal-personaltools a[href$='logout']";
    pub const CREATE_MODULE: &str = "a[href*='type_name=Module']";
    pub const CC_LICENSE_FORM: &str = "form[action='cc_license']";
    pub const AGREE_CHECKBOX: &str = "input[type='checkbox'][name='agree']";
    pub const METADATA_FORM: &str = "form[action='metadata_edit_form']";
    pub const TITLE_FIELD: &str = "input[name='title']";
    pub const IMPORT_FORMAT_ZIP: &str = "select[name='format'] option[value='zip']";
    pub const IMPORT_BUTTON: &str = "input[name='import']";
    pub const IMPORT_FORM: &str = "form[action='module_import_form'][name='import']";
    pub const IMPORT_FILE: &str = "input[type='file'][name='importFile']";
    pub const PUBLISH_LINK: &str = "a[href$='module_publish']";
    pub const CONTENT_PUBLISH_FORM: &str = "form[action='module_publish']";
    pub const CONFIRM_PUBLISH_FORM: &str = "form[action='publishContent']";
    pub const PUBLISHED_TITLE: &str = "#cnx_content_title";
    pub const SITE_ERROR_TEXT: &str = "Site Error";
}

use locators::*;

/// Page objects for the legacy server, backed by one WebDriver session.
pub struct LegacyPages {
    session: WebDriverSession,
    base_url: String,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl LegacyPages {
    pub fn new(session: WebDriverSession, base_url: &str, settings: &BrowserSettings) -> Self {
        Self {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
            wait_timeout: settings.page_load_timeout,
            poll_interval: settings.poll_interval,
        }
    }

    /// Poll until `check` yields a value or the page-load timeout expires.
    fn wait_until<T>(
        &self,
        waiting_for: &str,
        mut check: impl FnMut(&WebDriverSession) -> Result<Option<T>, DriverError>,
    ) -> Result<T, UiError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if let Some(found) = check(&self.session)? {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(UiError::Timeout {
                    waiting_for: waiting_for.to_string(),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn wait_for(&self, css: &str, waiting_for: &str) -> Result<ElementRef, UiError> {
        self.wait_until(waiting_for, |session| session.find(css))
    }

    fn require(&self, css: &str, element: &str) -> Result<ElementRef, UiError> {
        self.session
            .find(css)?
            .ok_or_else(|| UiError::MissingElement {
                element: element.to_string(),
            })
    }

    fn require_within(
        &self,
        parent: &ElementRef,
        css: &str,
        element: &str,
    ) -> Result<ElementRef, UiError> {
        self.session
            .find_within(parent, css)?
            .ok_or_else(|| UiError::MissingElement {
                element: element.to_string(),
            })
    }

    fn has_site_error(session: &WebDriverSession) -> Result<bool, DriverError> {
        if session.title()?.contains(SITE_ERROR_TEXT) {
            return Ok(true);
        }
        Ok(session.source()?.contains(SITE_ERROR_TEXT))
    }
}

impl LegacyUi for LegacyPages {
    fn login(&mut self, credentials: &Credentials) -> Result<bool, UiError> {
        self.session.goto(&format!("{}/login_form", self.base_url))?;
        let form = self.wait_for(LOGIN_FORM, "login form")?;
        let username = self.require_within(&form, LOGIN_USERNAME, "username field")?;
        let password = self.require_within(&form, LOGIN_PASSWORD, "password field")?;
        self.session.send_keys(&username, &credentials.username)?;
        self.session.send_keys(&password, &credentials.password)?;
        self.session.submit(&form)?;

        self.wait_until("login result", |session| {
            if session.find(LOGGED_IN)?.is_some() {
                return Ok(Some(true));
            }
            if session.find(LOGIN_ERROR)?.is_some() {
                return Ok(Some(false));
            }
            Ok(None)
        })
    }

    fn accept_license(&mut self) -> Result<(), UiError> {
        let create = self.require(CREATE_MODULE, "create module link")?;
        self.session.click(&create)?;
        let form = self.wait_for(CC_LICENSE_FORM, "license form")?;
        let agree = self.require_within(&form, AGREE_CHECKBOX, "license checkbox")?;
        self.session.click(&agree)?;
        self.session.submit(&form)?;
        self.wait_for(METADATA_FORM, "metadata form")?;
        Ok(())
    }

    fn fill_metadata(&mut self, title: &str) -> Result<String, UiError> {
        let form = self.require(METADATA_FORM, "metadata form")?;
        let field = self.require_within(&form, TITLE_FIELD, "title field")?;
        self.session.clear(&field)?;
        self.session.send_keys(&field, title)?;
        self.session.submit(&form)?;
        self.wait_for(IMPORT_FORMAT_ZIP, "module edit page")?;
        Ok(self.session.current_url()?)
    }

    fn upload_bundle(&mut self, bundle: &Path) -> Result<(), UiError> {
        let bundle = std::path::absolute(bundle).map_err(|err| {
            UiError::Driver(DriverError::InvalidResponse(format!(
                "cannot resolve {}: {err}",
                bundle.display()
            )))
        })?;
        let zip_option = self.require(IMPORT_FORMAT_ZIP, "zip import format")?;
        self.session.click(&zip_option)?;
        let import = self.require(IMPORT_BUTTON, "import button")?;
        self.session.click(&import)?;

        let form = self.wait_for(IMPORT_FORM, "import form")?;
        let file = self.require_within(&form, IMPORT_FILE, "import file field")?;
        self.session.send_keys(&file, &bundle.to_string_lossy())?;
        self.session.submit(&form)?;
        self.wait_for(PUBLISH_LINK, "module edit page after import")?;
        Ok(())
    }

    fn request_publish(&mut self) -> Result<(), UiError> {
        let publish = self.require(PUBLISH_LINK, "publish button")?;
        self.session.click(&publish)?;
        let form = self.wait_for(CONTENT_PUBLISH_FORM, "publish form")?;
        self.session.submit(&form)?;
        self.wait_for(CONFIRM_PUBLISH_FORM, "publish confirmation form")?;
        Ok(())
    }

    fn confirm_publish(&mut self) -> Result<Confirmation, UiError> {
        let form = self.require(CONFIRM_PUBLISH_FORM, "publish button")?;
        self.session.submit(&form)?;
        self.wait_until("published page", |session| {
            if let Some(heading) = session.find(PUBLISHED_TITLE)? {
                return Ok(Some(Confirmation::Published {
                    title: session.text(&heading)?,
                    url: session.current_url()?,
                }));
            }
            if Self::has_site_error(session)? {
                return Ok(Some(Confirmation::SiteError));
            }
            Ok(None)
        })
    }

    fn navigate_back(&mut self) -> Result<(), UiError> {
        self.session.back()?;
        self.wait_for(CONFIRM_PUBLISH_FORM, "publish confirmation form")?;
        Ok(())
    }

    fn close(&mut self) {
        kcopy_debug!("quitting browser for {}", self.base_url);
        self.session.quit();
    }
}

/// Launches Chrome through a chromedriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    settings: BrowserSettings,
}

impl WebDriverLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl BrowserLauncher for WebDriverLauncher {
    fn launch(&self, target_url: &str, headless: bool) -> Result<Box<dyn LegacyUi>, DriverError> {
        let session = WebDriverSession::start(
            &self.settings.webdriver_url,
            headless,
            self.settings.page_load_timeout,
        )?;
        Ok(Box::new(LegacyPages::new(session, target_url, &self.settings)))
    }
}
