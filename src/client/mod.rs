//! HTTP client for the token admin endpoint, used by `cvtool create-token`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Characters left unescaped in a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("server returned an empty token id")]
    EmptyToken,

    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct TokenClient {
    http: reqwest::Client,
    base_url: String,
}

impl TokenClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url)?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::BaseUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn create_token_url(&self, token_name: &str) -> String {
        format!(
            "{}/create_token/{}",
            self.base_url,
            utf8_percent_encode(token_name, PATH_SEGMENT)
        )
    }

    pub fn cv_url(&self, token_id: &str) -> String {
        format!("{}/cv/{}", self.base_url, token_id)
    }

    /// Ask the server for a new token and return its id
    pub async fn create_token(
        &self,
        token_name: &str,
        expiry: Option<&str>,
        credentials: &Credentials,
    ) -> Result<String, ClientError> {
        let url = self.create_token_url(token_name);
        debug!("GET {}", url);

        let mut request = self
            .http
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.password));
        if let Some(expiry) = expiry {
            request = request.query(&[("expiry", expiry)]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }

        let token_id = body.trim().to_string();
        if token_id.is_empty() {
            return Err(ClientError::EmptyToken);
        }
        Ok(token_id)
    }
}

/// `pdf/<token_name>/<basename>.pdf`, with `cv` as the default basename
pub fn default_output_path(token_name: &str, basename: Option<&str>) -> PathBuf {
    let stem = basename.filter(|b| !b.is_empty()).unwrap_or("cv");
    PathBuf::from("pdf")
        .join(token_name)
        .join(format!("{}.pdf", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = TokenClient::new("http://localhost:5000/").unwrap();
        assert_eq!(
            client.create_token_url("Acme Corp/HR"),
            "http://localhost:5000/create_token/Acme%20Corp%2FHR"
        );
        assert_eq!(client.cv_url("aB3-_x"), "http://localhost:5000/cv/aB3-_x");
    }

    #[test]
    fn test_rejects_non_url_base() {
        assert!(matches!(
            TokenClient::new("localhost"),
            Err(ClientError::BaseUrl(_))
        ));
        assert!(TokenClient::new("mailto:me@example.com").is_err());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path("acme", None),
            PathBuf::from("pdf/acme/cv.pdf")
        );
        assert_eq!(
            default_output_path("acme", Some("resume")),
            PathBuf::from("pdf/acme/resume.pdf")
        );
    }
}
