use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::client::ExtractionClient;
use crate::error::{ErrorContext, LedgerError, LedgerResult};
use crate::session::Session;

/// `<output_dir>/<stem>_corrected.json`
pub fn corrected_artifact_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}_corrected.json", stem))
}

/// Write the rows as pretty JSON, creating the output directory if needed
pub fn write_corrected(final_data: &Value, output_dir: &Path, stem: &str) -> LedgerResult<PathBuf> {
    std::fs::create_dir_all(output_dir).with_path(output_dir)?;
    let path = corrected_artifact_path(output_dir, stem);
    let content = serde_json::to_string_pretty(final_data)?;
    std::fs::write(&path, content).with_path(&path)?;
    info!("💾 Saved corrected table to {}", path.display());
    Ok(path)
}

/// Outcome of a save: the local artifact always exists, the submission may
/// have failed independently
#[derive(Debug)]
pub struct SaveReport {
    pub artifact: PathBuf,
    pub submission: LedgerResult<()>,
}

impl SaveReport {
    pub fn submitted(&self) -> bool {
        self.submission.is_ok()
    }
}

/// Submit the corrections, then write the local artifact whatever the
/// network outcome was
pub async fn save_session(
    session: &Session,
    client: &ExtractionClient,
    output_dir: &Path,
) -> LedgerResult<SaveReport> {
    save_corrections(
        session.original_filename(),
        session.document_id(),
        &session.final_data(),
        client,
        output_dir,
    )
    .await
}

/// Owned-data form of `save_session`, for callers that hand the work to
/// another task
pub async fn save_corrections(
    stem: Option<&str>,
    document_id: Option<&str>,
    final_data: &Value,
    client: &ExtractionClient,
    output_dir: &Path,
) -> LedgerResult<SaveReport> {
    let stem = stem
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LedgerError::input("No original file loaded"))?;
    let document_id = document_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LedgerError::input("Document id missing; reload the file"))?;

    let submission = client.submit_correction(document_id, final_data).await;
    if let Err(err) = &submission {
        warn!("Corrections not accepted by the backend: {}", err);
    }

    let artifact = write_corrected(final_data, output_dir, stem)?;
    Ok(SaveReport { artifact, submission })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ExtractedDocument;
    use crate::config::{BackendConfig, ViewConfig};
    use crate::table::AssignmentTable;
    use crate::tokens::TokenIndex;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(document_id: Option<&str>) -> Session {
        let document = ExtractedDocument {
            document_id: document_id.map(str::to_string),
            images: Vec::new(),
            table: AssignmentTable::from_wire(&json!([{ "compte": ["401", "1"] }])),
        };
        Session::new(document, TokenIndex::default(), &ViewConfig::default())
    }

    fn client(base_url: String) -> ExtractionClient {
        ExtractionClient::new(&BackendConfig {
            base_url,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_write_corrected_uses_wire_keys() {
        let dir = tempfile::tempdir().unwrap();
        let data = session(Some("d")).final_data();
        let path = write_corrected(&data, dir.path(), "bilan").unwrap();

        assert_eq!(path.file_name().unwrap(), "bilan_corrected.json");
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved[0]["compte"], json!(["401", "1"]));
        assert_eq!(saved[0]["solde_an"], json!(["N/A", null]));
    }

    #[tokio::test]
    async fn test_missing_filename_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_session(&session(Some("d")), &client("http://127.0.0.1:9".into()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Input { .. }));
    }

    #[tokio::test]
    async fn test_missing_document_id_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(None).with_original_filename("bilan");
        let err = save_session(&s, &client("http://127.0.0.1:9".into()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Input { .. }));
        assert!(!corrected_artifact_path(dir.path(), "bilan").exists());
    }

    #[tokio::test]
    async fn test_artifact_written_even_when_submission_fails() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/correct"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let s = session(Some("d")).with_original_filename("bilan");
        let report = save_session(&s, &client(server.uri()), dir.path()).await.unwrap();

        assert!(!report.submitted());
        assert!(report.artifact.exists());
    }
}
