use super::ExportError;
use super::geometry::SizedBox;
use async_trait::async_trait;
use serde::Serialize;

/// An `<a>` element as seen by the browser
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub href: Option<String>,
    pub rect: SizedBox,
    pub displayed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageSize {
    /// centimetres
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Body of the W3C WebDriver `print` command
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrintOptions {
    pub orientation: String,
    pub scale: f64,
    pub background: bool,
    pub page: PageSize,
    pub margin: Margins,
    pub shrink_to_fit: bool,
    pub page_ranges: Vec<String>,
}

impl PrintOptions {
    /// A4 portrait, no margins, no scaling, first page only
    pub fn a4() -> Self {
        Self {
            orientation: "portrait".to_string(),
            scale: 1.0,
            background: true,
            page: PageSize {
                width: 21.0,
                height: 29.7,
            },
            margin: Margins {
                top: 0.0,
                bottom: 0.0,
                left: 0.0,
                right: 0.0,
            },
            shrink_to_fit: false,
            page_ranges: vec!["1".to_string()],
        }
    }
}

/// The browser capabilities the exporter composes. One value is one session.
#[async_trait]
pub trait Browser: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), ExportError>;

    /// Layout box of the page `<body>`, in CSS pixels
    async fn body_rect(&mut self) -> Result<SizedBox, ExportError>;

    /// Every `<a>` element on the page, displayed or not
    async fn anchors(&mut self) -> Result<Vec<Anchor>, ExportError>;

    /// Raw PDF bytes of the printed page
    async fn print_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>, ExportError>;

    /// End the session and release the browser
    async fn close(&mut self) -> Result<(), ExportError>;
}
