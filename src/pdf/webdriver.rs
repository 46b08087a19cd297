use super::ExportError;
use super::browser::{Anchor, Browser, PrintOptions};
use super::exporter::ExportConfig;
use super::geometry::SizedBox;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// W3C key under which an element reference is returned
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// A headless Firefox session driven over the W3C WebDriver protocol.
///
/// When the session launched its own `geckodriver`, the process is killed on
/// [`close`](Browser::close) or on drop.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    driver: Option<Child>,
}

impl WebDriverSession {
    /// Start (or attach to) a WebDriver server and open a headless session
    pub async fn launch(config: &ExportConfig) -> Result<Self, ExportError> {
        let client = Client::new();

        let (base_url, driver) = match &config.driver_url {
            Some(url) => (url.trim_end_matches('/').to_string(), None),
            None => {
                let child = Command::new(&config.driver_path)
                    .arg("--port")
                    .arg(config.driver_port.to_string())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|source| ExportError::Launch {
                        binary: config.driver_path.display().to_string(),
                        source,
                    })?;
                info!(
                    "Launched {} on port {}",
                    config.driver_path.display(),
                    config.driver_port
                );
                (format!("http://127.0.0.1:{}", config.driver_port), Some(child))
            }
        };

        wait_until_ready(&client, &base_url, config).await?;

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "firefox",
                    "moz:firefoxOptions": {
                        "args": [
                            "-headless",
                            format!("-width={}", config.window_width),
                            format!("-height={}", config.window_height),
                        ],
                        "prefs": {
                            "pdfjs.disabled": true,
                            "print.always_print_silent": true
                        }
                    }
                }
            }
        });

        let value = send(&client, Method::POST, &format!("{}/session", base_url), Some(capabilities))
            .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ExportError::Protocol("new session response has no sessionId".into()))?
            .to_string();
        debug!("WebDriver session {}", session_id);

        let mut session = Self {
            client,
            base_url,
            session_id,
            driver,
        };

        let page_load_ms = config.page_load_timeout.as_millis() as u64;
        if let Err(e) = session
            .command(
                Method::POST,
                "timeouts",
                Some(json!({ "pageLoad": page_load_ms })),
            )
            .await
        {
            if let Err(close_err) = session.close().await {
                warn!("Failed to close WebDriver session: {}", close_err);
            }
            return Err(e);
        }

        Ok(session)
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ExportError> {
        let url = if path.is_empty() {
            format!("{}/session/{}", self.base_url, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.base_url, self.session_id, path)
        };
        send(&self.client, method, &url, body).await
    }

    async fn find_elements(&self, tag: &str) -> Result<Vec<String>, ExportError> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": "tag name", "value": tag })),
            )
            .await?;
        let items = value
            .as_array()
            .ok_or_else(|| ExportError::Protocol("find elements did not return a list".into()))?;
        items.iter().map(element_id).collect()
    }

    async fn find_element(&self, tag: &str) -> Result<String, ExportError> {
        let value = self
            .command(
                Method::POST,
                "element",
                Some(json!({ "using": "tag name", "value": tag })),
            )
            .await?;
        element_id(&value)
    }

    async fn element_rect(&self, element: &str) -> Result<SizedBox, ExportError> {
        let value = self
            .command(Method::GET, &format!("element/{}/rect", element), None)
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ExportError::Protocol(format!("bad element rect: {}", e)))
    }
}

#[async_trait]
impl Browser for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ExportError> {
        info!("Navigating to {}", url);
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn body_rect(&mut self) -> Result<SizedBox, ExportError> {
        let body = self.find_element("body").await?;
        self.element_rect(&body).await
    }

    async fn anchors(&mut self) -> Result<Vec<Anchor>, ExportError> {
        let ids = self.find_elements("a").await?;
        let mut anchors = Vec::with_capacity(ids.len());
        for id in ids {
            let displayed = self
                .command(Method::GET, &format!("element/{}/displayed", id), None)
                .await?
                .as_bool()
                .unwrap_or(false);
            let href = self
                .command(Method::GET, &format!("element/{}/property/href", id), None)
                .await?
                .as_str()
                .map(str::to_string);
            let rect = self.element_rect(&id).await?;
            anchors.push(Anchor {
                href,
                rect,
                displayed,
            });
        }
        Ok(anchors)
    }

    async fn print_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>, ExportError> {
        let body = serde_json::to_value(options)
            .map_err(|e| ExportError::Protocol(format!("cannot encode print options: {}", e)))?;
        let value = self.command(Method::POST, "print", Some(body)).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| ExportError::Protocol("print did not return a string".into()))?;
        Ok(STANDARD.decode(encoded)?)
    }

    async fn close(&mut self) -> Result<(), ExportError> {
        let result = self.command(Method::DELETE, "", None).await.map(|_| ());
        if let Some(mut child) = self.driver.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop WebDriver server: {}", e);
            }
        }
        result
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, ExportError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;
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
        return Err(ExportError::WebDriver { error, message });
    }
    Ok(value)
}

async fn wait_until_ready(
    client: &Client,
    base_url: &str,
    config: &ExportConfig,
) -> Result<(), ExportError> {
    let deadline = Instant::now() + config.startup_timeout;
    let status_url = format!("{}/status", base_url);
    loop {
        match send(client, Method::GET, &status_url, None).await {
            Ok(value) if value.get("ready").and_then(Value::as_bool).unwrap_or(true) => {
                return Ok(());
            }
            Ok(_) => debug!("WebDriver server not ready yet"),
            Err(e) => debug!("WebDriver status check failed: {}", e),
        }
        if Instant::now() >= deadline {
            return Err(ExportError::StartupTimeout(config.startup_timeout));
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

fn element_id(value: &Value) -> Result<String, ExportError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExportError::Protocol(format!("not an element reference: {}", value)))
}
