use crate::api::error::AppError;
use crate::config::AppConfig;
use serde::Deserialize;

/// Fields of the CV data file the page template needs
#[derive(Debug, Clone, Deserialize)]
pub struct CvData {
    pub title: String,
    #[serde(default)]
    pub cv_repo_url: Option<String>,
}

/// Renders the CV page from its template and data file.
///
/// Both files are read on every request, so edits are picked up without a
/// restart. The page body itself is filled in client-side from the data file.
pub struct CvPage;

impl CvPage {
    pub async fn render(config: &AppConfig) -> Result<String, AppError> {
        let template = tokio::fs::read_to_string(&config.template_path)
            .await
            .map_err(|e| {
                AppError::Internal(format!(
                    "cannot read template {}: {}",
                    config.template_path.display(),
                    e
                ))
            })?;

        let data_path = config.data_path();
        let raw = tokio::fs::read(&data_path).await.map_err(|e| {
            AppError::Internal(format!("cannot read {}: {}", data_path.display(), e))
        })?;
        let data: CvData = serde_json::from_slice(&raw).map_err(|e| {
            AppError::Internal(format!("invalid CV data in {}: {}", data_path.display(), e))
        })?;

        let data_url = format!("/static/{}", config.data_file);
        Ok(Self::fill(&template, &data, &data_url))
    }

    /// Substitute `{{ cv_title }}`, `{{ cv_data_url }}` and `{{ cv_repo_url }}`
    pub fn fill(template: &str, data: &CvData, data_url: &str) -> String {
        template
            .replace("{{ cv_title }}", &escape_html(&data.title))
            .replace("{{ cv_data_url }}", &escape_html(data_url))
            .replace(
                "{{ cv_repo_url }}",
                &escape_html(data.cv_repo_url.as_deref().unwrap_or_default()),
            )
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}
