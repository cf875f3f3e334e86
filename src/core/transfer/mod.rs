// ─── Transfer Orchestrator ───
// Download-install, export and import jobs. Each job owns a temp workspace,
// runs its stages in order and reports one blended percentage.

mod download;
mod export;
mod import;
mod job;
mod service;
mod temp;

pub use download::DownloadRequest;
pub use export::{ExportSummary, ExportedGame};
pub use import::ImportSummary;
pub use job::{JobState, TransferJob, TransferKind};
pub use service::TransferService;
pub use temp::TempWorkspace;
