use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use super::template::ExportCommand;
use crate::auth::Credential;
use crate::error::{ExportError, Result};
use crate::kusto::{QueryResult, QueryService};

/// Column of the export result that holds the produced blob's URL.
pub const PATH_COLUMN: &str = "Path";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub object_path: String,
}

pub struct ExportOrchestrator {
    service: Arc<dyn QueryService>,
}

impl ExportOrchestrator {
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self { service }
    }

    /// Submits the command once. Exports write into a shared namespace, so a
    /// failed submission is reported rather than retried.
    pub async fn export(
        &self,
        credential: &Credential,
        command: &ExportCommand,
    ) -> Result<ExportResult> {
        if !credential.is_verified() {
            return Err(ExportError::auth(
                credential.mode(),
                "credential has not been verified by a probe",
            ));
        }

        info!(
            endpoint = credential.endpoint(),
            database = credential.database(),
            "Export submitted"
        );

        let result = self
            .service
            .execute_mgmt(credential, command.text())
            .await
            .inspect_err(|e| error!(kind = e.kind(), error = %e, "Export failed"))?;

        let object_path = extract_object_path(&result)
            .inspect_err(|e| error!(kind = e.kind(), error = %e, "Export failed"))?;

        info!(%object_path, "Export succeeded");
        Ok(ExportResult { object_path })
    }
}

/// Reads the first row's `Path` value from an export result.
pub fn extract_object_path(result: &QueryResult) -> Result<String> {
    if result.is_empty() {
        return Err(ExportError::Extraction(
            "export reported success but returned no rows".to_string(),
        ));
    }
    if result.column_index(PATH_COLUMN).is_none() {
        let columns: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        return Err(ExportError::Extraction(format!(
            "export result has no '{}' column (columns: {})",
            PATH_COLUMN,
            columns.join(", ")
        )));
    }

    match result.first_value(PATH_COLUMN) {
        Some(Value::String(path)) if !path.trim().is_empty() => Ok(path.clone()),
        Some(Value::String(_)) => Err(ExportError::Extraction(format!(
            "'{}' value in export result is empty",
            PATH_COLUMN
        ))),
        other => Err(ExportError::Extraction(format!(
            "'{}' value in export result is not a string: {:?}",
            PATH_COLUMN, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, AuthMode};
    use crate::export::{render, ExportParameters};
    use crate::kusto::{ColumnInfo, MockQueryService};
    use crate::storage::StorageKey;
    use serde_json::json;

    const BLOB: &str = "https://acct.blob/cont/folder/t1_000.csv";

    fn verified() -> Credential {
        Credential::unverified(
            "https://help.kusto.windows.net",
            "Samples",
            AuthMode::AzCli,
            AccessToken::new("tok"),
        )
        .mark_verified()
    }

    fn command() -> ExportCommand {
        let params = ExportParameters::new(
            "https://acct.blob.core.windows.net/cont/folder",
            StorageKey::parse("a2V5").unwrap(),
            "t1",
            false,
        )
        .unwrap();
        render("print('hi')", &params)
    }

    fn column(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            column_type: "string".to_string(),
        }
    }

    #[tokio::test]
    async fn test_export_returns_path() {
        let service = Arc::new(MockQueryService::new());
        service.push_single("Path", BLOB);
        let orchestrator = ExportOrchestrator::new(service.clone());

        let result = orchestrator.export(&verified(), &command()).await.unwrap();

        assert_eq!(result.object_path, BLOB);
        assert_eq!(service.submitted_commands(), vec![command().text().to_string()]);
    }

    #[tokio::test]
    async fn test_empty_result_is_extraction_error() {
        let service = Arc::new(MockQueryService::new());
        service.push_result(QueryResult::new(vec![column("Path")], vec![]));
        let orchestrator = ExportOrchestrator::new(service);

        let err = orchestrator.export(&verified(), &command()).await.unwrap_err();
        assert_eq!(err.kind(), "extraction");
    }

    #[tokio::test]
    async fn test_service_error_is_not_retried() {
        let service = Arc::new(MockQueryService::new());
        service.push_failure("Export failed: container not found");
        service.push_single("Path", BLOB);
        let orchestrator = ExportOrchestrator::new(service.clone());

        let err = orchestrator.export(&verified(), &command()).await.unwrap_err();

        assert_eq!(err.kind(), "service");
        assert!(err.to_string().contains("container not found"));
        assert_eq!(service.submitted_commands().len(), 1);
    }

    #[tokio::test]
    async fn test_unverified_credential_is_refused() {
        let service = Arc::new(MockQueryService::new());
        let orchestrator = ExportOrchestrator::new(service.clone());
        let cred = Credential::unverified(
            "https://help.kusto.windows.net",
            "Samples",
            AuthMode::AzCli,
            AccessToken::new("tok"),
        );

        let err = orchestrator.export(&cred, &command()).await.unwrap_err();

        assert!(err.is_auth());
        assert!(service.submitted_commands().is_empty());
    }

    #[test]
    fn test_missing_path_column() {
        let result = QueryResult::new(
            vec![column("NumRecords")],
            vec![vec![json!(10)]],
        );
        let err = extract_object_path(&result).unwrap_err();
        assert_eq!(err.kind(), "extraction");
        assert!(err.to_string().contains("NumRecords"));
    }

    #[test]
    fn test_empty_or_null_path_value() {
        for value in [json!(""), json!(null), json!(3)] {
            let result = QueryResult::new(vec![column("Path")], vec![vec![value]]);
            assert_eq!(extract_object_path(&result).unwrap_err().kind(), "extraction");
        }
    }

    #[test]
    fn test_first_row_wins() {
        let result = QueryResult::new(
            vec![column("Path"), column("NumRecords")],
            vec![
                vec![json!(BLOB), json!(5)],
                vec![json!("https://acct.blob/cont/folder/t1_001.csv"), json!(5)],
            ],
        );
        assert_eq!(extract_object_path(&result).unwrap(), BLOB);
    }
}
