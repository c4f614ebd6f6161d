use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::result::{ColumnInfo, QueryResult};
use super::QueryService;
use crate::auth::{AuthMode, Credential};
use crate::error::{ExportError, Result};

enum MgmtOutcome {
    Rows(QueryResult),
    Failure(String),
}

/// In-memory query service for tests and dry runs.
///
/// Probes succeed unless the credential's auth mode has been rejected or given
/// a scripted failure. Management commands answer from a queue of scripted
/// outcomes; an empty queue answers with an empty result set.
#[derive(Default)]
pub struct MockQueryService {
    rejected_modes: Mutex<HashSet<AuthMode>>,
    probe_failures: Mutex<HashMap<AuthMode, String>>,
    outcomes: Mutex<VecDeque<MgmtOutcome>>,
    probed: Mutex<Vec<AuthMode>>,
    submitted: Mutex<Vec<String>>,
}

impl MockQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes made with `mode` fail with an authentication error.
    pub fn reject_mode(&self, mode: AuthMode) {
        lock(&self.rejected_modes).insert(mode);
    }

    /// Probes made with `mode` fail with a non-authentication service error.
    pub fn fail_probe(&self, mode: AuthMode, message: impl Into<String>) {
        lock(&self.probe_failures).insert(mode, message.into());
    }

    pub fn push_result(&self, result: QueryResult) {
        lock(&self.outcomes).push_back(MgmtOutcome::Rows(result));
    }

    /// Queues a single-row result with one string column.
    pub fn push_single(&self, column: &str, value: &str) {
        self.push_result(QueryResult::new(
            vec![ColumnInfo {
                name: column.to_string(),
                column_type: "string".to_string(),
            }],
            vec![vec![Value::String(value.to_string())]],
        ));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.outcomes).push_back(MgmtOutcome::Failure(message.into()));
    }

    pub fn probed_modes(&self) -> Vec<AuthMode> {
        lock(&self.probed).clone()
    }

    pub fn submitted_commands(&self) -> Vec<String> {
        lock(&self.submitted).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn probe(&self, credential: &Credential) -> Result<()> {
        let mode = credential.mode();
        lock(&self.probed).push(mode);

        if lock(&self.rejected_modes).contains(&mode) {
            return Err(ExportError::auth(mode, "HTTP 401: Unauthorized"));
        }
        if let Some(message) = lock(&self.probe_failures).get(&mode) {
            return Err(ExportError::Service(message.clone()));
        }
        Ok(())
    }

    async fn execute_mgmt(&self, _credential: &Credential, command: &str) -> Result<QueryResult> {
        lock(&self.submitted).push(command.to_string());

        match lock(&self.outcomes).pop_front() {
            Some(MgmtOutcome::Rows(result)) => Ok(result),
            Some(MgmtOutcome::Failure(message)) => Err(ExportError::Service(message)),
            None => Ok(QueryResult::default()),
        }
    }
}
