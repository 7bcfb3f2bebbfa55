use std::time::Duration;

use kcopy_logging::{kcopy_trace, kcopy_warn};
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Value};

use crate::driver::DriverError;

/// W3C key under which element references are serialized.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }
}

/// Minimal blocking W3C WebDriver client (one chromedriver session).
///
/// Must not be used from inside an async runtime thread; the publish
/// workers run on plain threads.
pub struct WebDriverSession {
    client: Client,
    session_url: String,
    closed: bool,
}

impl WebDriverSession {
    pub fn start(
        webdriver_url: &str,
        headless: bool,
        page_load_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let client = Client::builder()
            // Leave headroom above the page-load timeout the driver enforces.
            .timeout(page_load_timeout + Duration::from_secs(30))
            .build()
            .map_err(|err| DriverError::Transport(err.to_string()))?;

        let mut args = vec!["--disable-gpu", "--no-sandbox"];
        if headless {
            args.push("--headless=new");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let base = webdriver_url.trim_end_matches('/');
        let value = send(
            &client,
            Method::POST,
            &format!("{base}/session"),
            Some(capabilities),
        )?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::InvalidResponse(format!("no sessionId in {value}")))?;

        let session = Self {
            client,
            session_url: format!("{base}/session/{session_id}"),
            closed: false,
        };
        session.command(
            Method::POST,
            "/timeouts",
            Some(json!({
                "pageLoad": page_load_timeout.as_millis() as u64,
                "implicit": 0
            })),
        )?;
        Ok(session)
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        if self.closed {
            return Err(DriverError::InvalidResponse("session already closed".into()));
        }
        send(&self.client, method, &format!("{}{}", self.session_url, path), body)
    }

    pub fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .map(|_| ())
    }

    pub fn current_url(&self) -> Result<String, DriverError> {
        string_value(self.command(Method::GET, "/url", None)?)
    }

    pub fn title(&self) -> Result<String, DriverError> {
        string_value(self.command(Method::GET, "/title", None)?)
    }

    pub fn source(&self) -> Result<String, DriverError> {
        string_value(self.command(Method::GET, "/source", None)?)
    }

    pub fn back(&self) -> Result<(), DriverError> {
        self.command(Method::POST, "/back", Some(json!({}))).map(|_| ())
    }

    /// `Ok(None)` when nothing matches `css`.
    pub fn find(&self, css: &str) -> Result<Option<ElementRef>, DriverError> {
        element_or_none(self.command(
            Method::POST,
            "/element",
            Some(json!({ "using": "css selector", "value": css })),
        ))
    }

    /// Like [`Self::find`], scoped to the descendants of `parent`.
    pub fn find_within(
        &self,
        parent: &ElementRef,
        css: &str,
    ) -> Result<Option<ElementRef>, DriverError> {
        element_or_none(self.command(
            Method::POST,
            &format!("/element/{}/element", parent.0),
            Some(json!({ "using": "css selector", "value": css })),
        ))
    }

    pub fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .map(|_| ())
    }

    pub fn clear(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/element/{}/clear", element.0),
            Some(json!({})),
        )
        .map(|_| ())
    }

    pub fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .map(|_| ())
    }

    pub fn text(&self, element: &ElementRef) -> Result<String, DriverError> {
        string_value(self.command(Method::GET, &format!("/element/{}/text", element.0), None)?)
    }

    /// Submit the form `element` belongs to (or is).
    pub fn submit(&self, element: &ElementRef) -> Result<(), DriverError> {
        let script = "var el = arguments[0]; \
                      var form = el.tagName === 'FORM' ? el : el.form; \
                      HTMLFormElement.prototype.submit.call(form);";
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [element.to_json()] })),
        )
        .map(|_| ())
    }

    /// Delete the session. Later calls are no-ops.
    pub fn quit(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = send(&self.client, Method::DELETE, &self.session_url, None) {
            kcopy_warn!("could not delete webdriver session {}: {}", self.session_url, err);
        }
        self.closed = true;
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        self.quit();
    }
}

fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, DriverError> {
    kcopy_trace!("webdriver {} {}", method, url);
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request
        .send()
        .map_err(|err| DriverError::Transport(err.to_string()))?;
    let status = response.status();
    let payload: Value = response
        .json()
        .map_err(|err| DriverError::InvalidResponse(err.to_string()))?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(DriverError::Command { error, message });
    }
    Ok(value)
}

fn string_value(value: Value) -> Result<String, DriverError> {
    value
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| DriverError::InvalidResponse(format!("expected string, got {value}")))
}

fn element_or_none(result: Result<Value, DriverError>) -> Result<Option<ElementRef>, DriverError> {
    match result {
        Ok(value) => value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| Some(ElementRef(id.to_string())))
            .ok_or_else(|| DriverError::InvalidResponse(format!("no element reference in {value}"))),
        Err(err) if err.is_no_such_element() => Ok(None),
        Err(err) => Err(err),
    }
}
