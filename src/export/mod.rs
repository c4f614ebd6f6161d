mod job;
mod orchestrator;
mod params;
mod template;

pub use job::{ExportJob, ExportOutcome, ExportRequest, Stage};
pub use orchestrator::{extract_object_path, ExportOrchestrator, ExportResult, PATH_COLUMN};
pub use params::{validate_name_prefix, validate_storage_uri, ExportParameters};
pub use template::{render, ExportCommand, SIZE_LIMIT_BYTES};
