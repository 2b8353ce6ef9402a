//! HTTP client for the extraction backend and its token side channel.

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::error::{ErrorContext, LedgerError, LedgerResult};
use crate::logging::PerformanceTimer;
use crate::table::AssignmentTable;
use crate::tokens::TokenIndex;

/// Result of `POST /extract`, after shape normalization
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub document_id: Option<String>,
    /// Page image references, `\` normalized to `/`
    pub images: Vec<String>,
    pub table: AssignmentTable,
}

impl ExtractedDocument {
    /// Accepts `{documentId, images, data}` as well as a bare array of rows
    pub fn from_response(body: &Value) -> Self {
        let document_id = body
            .get("documentId")
            .or_else(|| body.as_array().and_then(|rows| rows.first()).and_then(|r| r.get("documentId")))
            .and_then(|id| match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        if document_id.is_none() {
            warn!("No documentId in extraction response; corrections cannot be submitted");
        }

        let images = body
            .get("images")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.replace('\\', "/"))
                    .collect()
            })
            .unwrap_or_default();

        let table = match body.get("data") {
            Some(data) => AssignmentTable::from_wire(data),
            None if body.is_array() => AssignmentTable::from_wire(body),
            None => AssignmentTable::default(),
        };

        Self {
            document_id,
            images,
            table,
        }
    }

    /// Inverse of `from_response`, for snapshots on disk
    pub fn to_response(&self) -> Value {
        json!({
            "documentId": self.document_id,
            "images": self.images,
            "data": self.table.to_wire(),
        })
    }

    pub fn load_from_file(path: &Path) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let body: Value = serde_json::from_str(&content)?;
        Ok(Self::from_response(&body))
    }

    pub fn save_to_file(&self, path: &Path) -> LedgerResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.to_response())?;
        std::fs::write(path, content).with_path(path)
    }
}

/// Base name up to the first dot: `report.final.pdf` → `report`
pub fn document_stem(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default()
        .to_string()
}

/// `<token_dir>/<stem>.json`
pub fn token_file_path(token_dir: &Path, stem: &str) -> PathBuf {
    token_dir.join(format!("{}.json", stem))
}

/// Load the token side channel written by the extractor for `source`
pub fn load_tokens_for(token_dir: &Path, source: &Path) -> LedgerResult<TokenIndex> {
    let path = token_file_path(token_dir, &document_stem(source));
    TokenIndex::load_from_file(&path)
}

#[derive(Clone)]
pub struct ExtractionClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExtractionClient {
    pub fn new(config: &BackendConfig) -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /extract` with the document as multipart field `file`.
    /// Nothing is returned unless the whole exchange succeeds.
    pub async fn extract(&self, file_path: &Path) -> LedgerResult<ExtractedDocument> {
        let _timer = PerformanceTimer::start("extract");

        if !file_path.exists() {
            return Err(LedgerError::input(format!("File not found: {}", file_path.display())));
        }
        let content = tokio::fs::read(file_path).await.with_path(file_path)?;
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        let form = Form::new().part(
            "file",
            Part::bytes(content)
                .file_name(file_name.clone())
                .mime_str("application/octet-stream")?,
        );

        info!("Sending {} to {}/extract", file_name, self.base_url);
        let response = self
            .http
            .post(format!("{}/extract", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = LedgerError::transport(Some(status.as_u16()), body);
            crate::log_error!(err, "extract");
            return Err(err);
        }

        let body: Value = response.json().await?;
        let document = ExtractedDocument::from_response(&body);
        info!(
            "Extracted {} rows over {} pages (document {:?})",
            document.table.row_count(),
            document.images.len(),
            document.document_id
        );
        Ok(document)
    }

    /// `PATCH /correct` with `{documentId, finalData}`
    pub async fn submit_correction(&self, document_id: &str, final_data: &Value) -> LedgerResult<()> {
        let _timer = PerformanceTimer::start("submit_correction");
        let payload = json!({
            "documentId": document_id,
            "finalData": final_data,
        });

        let response = self
            .http
            .patch(format!("{}/correct", self.base_url))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("Corrections for {} accepted", document_id);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("HTTP status {}", status.as_u16()));
        let err = LedgerError::transport(Some(status.as_u16()), reason);
        crate::log_error!(err, "submit_correction");
        Err(err)
    }
}
