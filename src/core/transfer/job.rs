use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::temp::TempWorkspace;
use crate::core::error::TransferResult;
use crate::core::progress::{ProgressBlender, ProgressChannel, ProgressEmitter};

/// Which orchestrated operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Download,
    Export,
    Import,
}

pub const DOWNLOAD_STAGE: usize = 0;
pub const COPY_STAGE: usize = 0;
pub const COMPRESS_STAGE: usize = 1;
pub const EXTRACT_STAGE: usize = 0;

impl TransferKind {
    /// Fixed `(name, weight)` plan per kind; weights sum to 1.0.
    pub fn stages(self) -> &'static [(&'static str, f64)] {
        match self {
            TransferKind::Download => &[("download", 1.0)],
            TransferKind::Export => &[("copy", 0.3), ("compress", 0.7)],
            TransferKind::Import => &[("extract", 1.0)],
        }
    }

    pub fn channel(self) -> ProgressChannel {
        match self {
            TransferKind::Download => ProgressChannel::Download,
            TransferKind::Export => ProgressChannel::Export,
            TransferKind::Import => ProgressChannel::Import,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransferKind::Download => "download",
            TransferKind::Export => "export",
            TransferKind::Import => "import",
        }
    }
}

/// Lifecycle of a job: `Init → Preparing → Active(stage) → Finalizing → Done`,
/// or `Failed` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    Preparing,
    Active(&'static str),
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Init => write!(f, "init"),
            JobState::Preparing => write!(f, "preparing"),
            JobState::Active(stage) => write!(f, "active({stage})"),
            JobState::Finalizing => write!(f, "finalizing"),
            JobState::Done => write!(f, "done"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// One orchestrated operation: its temp workspace, stage plan and progress.
pub struct TransferJob {
    kind: TransferKind,
    workspace: TempWorkspace,
    blender: ProgressBlender,
    emitter: ProgressEmitter,
    state: JobState,
}

impl TransferJob {
    pub fn new(kind: TransferKind, temp_root: &Path, emitter: ProgressEmitter) -> Self {
        let workspace = TempWorkspace::allocate(temp_root, kind);
        debug!("New {} job, workspace {:?}", kind.label(), workspace.path());
        Self {
            kind,
            workspace,
            blender: ProgressBlender::new(kind.stages()),
            emitter,
            state: JobState::Init,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn transition(&mut self, next: JobState) {
        debug!("{} job: {} -> {}", self.kind.label(), self.state, next);
        self.state = next;
    }

    /// Enter `Preparing` and create the temp workspace.
    pub async fn prepare(&mut self) -> TransferResult<&Path> {
        self.transition(JobState::Preparing);
        self.workspace.create().await
    }

    pub fn begin_stage(&mut self, index: usize) {
        let name = self.blender.stage_name(index).unwrap_or("unknown");
        self.transition(JobState::Active(name));
    }

    /// Record a stage percentage and emit the blended overall value.
    pub fn report(&mut self, index: usize, percent: f64) {
        let overall = self.blender.report(index, percent);
        self.emitter.emit(overall);
    }

    pub fn complete_stage(&mut self, index: usize) {
        self.report(index, 100.0);
    }

    /// For stages whose progress is the collaborator's own 0–100 scale.
    pub fn emitter_mut(&mut self) -> &mut ProgressEmitter {
        &mut self.emitter
    }

    /// Close out the job: the workspace is removed on both paths and a cleanup
    /// failure is only logged, so it never replaces the job's own outcome.
    pub async fn finish<T>(mut self, result: TransferResult<T>) -> TransferResult<T> {
        match result {
            Ok(value) => {
                self.transition(JobState::Finalizing);
                if let Err(e) = self.workspace.remove().await {
                    warn!("{} job finished but temp cleanup failed: {}", self.kind.label(), e);
                }
                self.transition(JobState::Done);
                info!("{} job completed", self.kind.label());
                Ok(value)
            }
            Err(err) => {
                self.transition(JobState::Failed);
                error!("{} job failed: {}", self.kind.label(), err);
                if let Err(e) = self.workspace.remove().await {
                    warn!("Temp cleanup after failed {} job failed: {}", self.kind.label(), e);
                }
                Err(err)
            }
        }
    }
}
