//! Print a web page to PDF through a headless browser and put its hyperlinks back.
//!
//! Browser "print to PDF" drops link geometry. The exporter records every
//! visible anchor's box relative to `<body>` before printing, then writes a
//! URI link annotation for each one onto page 1 of the printed document.

pub mod annotate;
pub mod browser;
pub mod exporter;
pub mod geometry;
pub mod webdriver;

use std::time::Duration;
use thiserror::Error;

pub use exporter::{ExportConfig, ExportSummary, export_pdf};
pub use geometry::{Link, SizedBox};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to launch WebDriver server {binary:?}: {source}")]
    Launch {
        binary: String,
        source: std::io::Error,
    },

    #[error("WebDriver server was not ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("WebDriver transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error {error}: {message}")]
    WebDriver { error: String, message: String },

    #[error("unexpected WebDriver response: {0}")]
    Protocol(String),

    #[error("printed PDF is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("printed PDF has no pages")]
    EmptyPdf,

    #[error("page 1 has no usable TrimBox, CropBox or MediaBox")]
    MissingPageBox,

    #[error("page body has zero width")]
    ZeroWidthBody,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
