use super::ExportError;
use super::annotate;
use super::browser::{Browser, PrintOptions};
use super::geometry::Link;
use super::webdriver::WebDriverSession;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// `geckodriver` executable, spawned per export
    pub driver_path: PathBuf,
    pub driver_port: u16,
    /// Attach to an already running WebDriver server instead of spawning one
    pub driver_url: Option<String>,
    pub startup_timeout: Duration,
    pub page_load_timeout: Duration,
    /// Pause after navigation so client-side rendering can finish
    pub settle_delay: Duration,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            driver_path: PathBuf::from("geckodriver"),
            driver_port: 4444,
            driver_url: None,
            startup_timeout: Duration::from_secs(10),
            page_load_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl ExportConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let driver_path = env::var("GECKODRIVER_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.driver_path);

        let driver_port = env::var("GECKODRIVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.driver_port);

        let driver_url = env::var("WEBDRIVER_URL").ok().filter(|v| !v.is_empty());

        let settle_delay = env::var("PDF_SETTLE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.settle_delay);

        let startup_timeout = env::var("WEBDRIVER_STARTUP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.startup_timeout);

        Self {
            driver_path,
            driver_port,
            driver_url,
            startup_timeout,
            settle_delay,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub links: usize,
}

/// Collect the visible hyperlinks of the current page, boxed relative to `<body>`.
///
/// Anchors that are hidden or have no `href` are skipped.
pub async fn extract_links<B: Browser + ?Sized>(browser: &mut B) -> Result<Vec<Link>, ExportError> {
    let body = browser.body_rect().await?;
    if body.width <= 0.0 {
        return Err(ExportError::ZeroWidthBody);
    }

    let links = browser
        .anchors()
        .await?
        .into_iter()
        .filter(|anchor| anchor.displayed)
        .filter_map(|anchor| {
            let uri = anchor.href.filter(|href| !href.is_empty())?;
            Some(Link {
                uri,
                rect: anchor.rect.relative_to(&body),
            })
        })
        .collect();
    Ok(links)
}

/// Render `url` with an open browser and write the annotated first page to `output`
pub async fn export_with<B: Browser + ?Sized>(
    browser: &mut B,
    url: &str,
    output: &Path,
    settle_delay: Duration,
) -> Result<ExportSummary, ExportError> {
    browser.navigate(url).await?;
    if !settle_delay.is_zero() {
        tokio::time::sleep(settle_delay).await;
    }

    let links = extract_links(browser).await?;
    info!("Found {} visible links", links.len());

    let pdf = browser.print_pdf(&PrintOptions::a4()).await?;
    let mut document = annotate::load(&pdf)?;
    let written = annotate::add_link_annotations(&mut document, &links)?;
    annotate::save(&mut document, output)?;

    info!("Wrote {} with {} links", output.display(), written);
    Ok(ExportSummary {
        output: output.to_path_buf(),
        links: written,
    })
}

/// Export with `browser`, then end its session whether or not the export succeeded
pub async fn run_session<B: Browser + ?Sized>(
    browser: &mut B,
    url: &str,
    output: &Path,
    settle_delay: Duration,
) -> Result<ExportSummary, ExportError> {
    let result = export_with(browser, url, output, settle_delay).await;
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    result
}

/// Launch a browser and export one page with it
pub async fn export_pdf(
    config: &ExportConfig,
    url: &str,
    output: &Path,
) -> Result<ExportSummary, ExportError> {
    let mut session = WebDriverSession::launch(config).await?;
    run_session(&mut session, url, output, config.settle_delay).await
}
