//! The backup workflow: dump → compress → upload → prune.
//!
//! ```text
//! start ─► dumped ─► compressed ─┬─► uploaded ──────┬─► cleaned ─► done
//!   │         │                  └─► upload_failed ─┘
//!   └─────────┴─► failed
//! ```
//!
//! Only the dump/compress step can fail the run.  Upload and cleanup problems
//! are reported as warnings: once a local artifact exists the backup has
//! succeeded, whatever happens to the offsite copy.

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::{
    artifact::BackupArtifact,
    config::Config,
    dump,
    error::DumpError,
    remote::{RemoteQuery, RemoteRecord, RemoteSession},
    retention,
    ui::{Reporter, StageOutcome},
};

pub const STAGE_DUMP: &str = "Dump";
pub const STAGE_UPLOAD: &str = "Upload";
pub const STAGE_CLEANUP_LOCAL: &str = "Cleanup (local)";
pub const STAGE_CLEANUP_REMOTE: &str = "Cleanup (remote)";

/// Stage switches from the command line.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub upload: bool,
    pub cleanup: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            upload: true,
            cleanup: true,
        }
    }
}

/// Names removed by one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub local_removed: Vec<String>,
    pub remote_removed: Vec<String>,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub artifact: BackupArtifact,
    /// `None` when the upload was skipped or failed.
    pub uploaded: Option<RemoteRecord>,
    pub cleanup: CleanupReport,
}

pub struct BackupWorkflow<'a> {
    cfg: &'a Config,
    remote: RemoteSession,
    reporter: &'a dyn Reporter,
    options: RunOptions,
    outcomes: Vec<StageOutcome>,
}

impl<'a> BackupWorkflow<'a> {
    /// Creates the backup directory if it does not exist yet.
    pub fn new(
        cfg: &'a Config,
        remote: RemoteSession,
        reporter: &'a dyn Reporter,
        options: RunOptions,
    ) -> Result<Self, DumpError> {
        std::fs::create_dir_all(&cfg.backup.dir).map_err(|source| DumpError::Write {
            path: cfg.backup.dir.clone(),
            source,
        })?;
        Ok(Self {
            cfg,
            remote,
            reporter,
            options,
            outcomes: Vec::new(),
        })
    }

    /// Every stage outcome recorded so far, in order.
    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    fn record(&mut self, outcome: StageOutcome) {
        self.reporter.end(&outcome);
        self.outcomes.push(outcome);
    }

    // ── create ────────────────────────────────────────────────────────────────

    /// Dump and compress into the backup directory.
    pub fn create_backup(&mut self) -> Result<BackupArtifact, DumpError> {
        self.reporter.begin(STAGE_DUMP);
        match dump::create_backup(&self.cfg.database, &self.cfg.backup.dir, Local::now()) {
            Ok(artifact) => {
                let detail = format!("{} ({:.2} MB)", artifact.name, artifact.size_mb());
                self.record(StageOutcome::ok(STAGE_DUMP, detail));
                Ok(artifact)
            },
            Err(e) => {
                error!(error = %e, "backup creation failed");
                let (message, stderr) = match &e {
                    DumpError::Exited {
                        program,
                        status,
                        stderr,
                    } => (format!("{program} exited with {status}"), stderr.clone()),
                    other => (error_chain(other), String::new()),
                };
                self.record(StageOutcome::failed(STAGE_DUMP, message, stderr));
                Err(e)
            },
        }
    }

    // ── upload ────────────────────────────────────────────────────────────────

    /// Upload `artifact`, opening the remote session on first use.
    ///
    /// Never fails the run: problems become a warning and `None`.
    pub fn upload(&mut self, artifact: &BackupArtifact) -> Option<RemoteRecord> {
        if !self.options.upload {
            self.record(StageOutcome::skipped(STAGE_UPLOAD, "--no-upload"));
            return None;
        }

        self.reporter.begin(STAGE_UPLOAD);
        let cfg = self.cfg;
        let folder = cfg.drive.folder_id.as_deref();
        let result = self
            .remote
            .connect()
            .and_then(|store| store.upload(&artifact.path, &artifact.name, folder));

        match result {
            Ok(record) => {
                info!(id = %record.id, name = %record.name, "uploaded to remote storage");
                self.record(StageOutcome::ok(STAGE_UPLOAD, format!("id {}", record.id)));
                Some(record)
            },
            Err(e) => {
                let message = error_chain(&e);
                warn!(error = %message, "upload failed, local backup exists");
                self.record(StageOutcome::warn(STAGE_UPLOAD, message));
                None
            },
        }
    }

    // ── cleanup ───────────────────────────────────────────────────────────────

    /// Prune locally, then remotely if a session is active.  Never fails.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if !self.options.cleanup {
            self.record(StageOutcome::skipped(STAGE_CLEANUP_LOCAL, "--no-cleanup"));
            self.record(StageOutcome::skipped(STAGE_CLEANUP_REMOTE, "--no-cleanup"));
            return report;
        }

        let cfg = self.cfg;
        let source = cfg.database.name.as_str();
        let keep = cfg.backup.keep;
        debug!(
            keep,
            retention_days = cfg.backup.retention_days,
            "retention settings; only the count is applied"
        );

        self.reporter.begin(STAGE_CLEANUP_LOCAL);
        match retention::prune_local(&cfg.backup.dir, source, keep) {
            Ok(removed) => {
                let detail = format!("{} removed, keeping {keep}", removed.len());
                report.local_removed = removed;
                self.record(StageOutcome::ok(STAGE_CLEANUP_LOCAL, detail));
            },
            Err(e) => {
                warn!(error = %e, "local cleanup failed");
                self.record(StageOutcome::warn(STAGE_CLEANUP_LOCAL, e.to_string()));
            },
        }

        let Some(store) = self.remote.active() else {
            self.record(StageOutcome::skipped(STAGE_CLEANUP_REMOTE, "no remote session"));
            return report;
        };

        self.reporter.begin(STAGE_CLEANUP_REMOTE);
        let query = RemoteQuery::for_source(source, cfg.drive.folder_id.as_deref());
        let outcome = match retention::prune_remote(store, &query, keep) {
            Ok(removed) => {
                let detail = format!("{} removed, keeping {keep}", removed.len());
                report.remote_removed = removed;
                StageOutcome::ok(STAGE_CLEANUP_REMOTE, detail)
            },
            Err(e) => {
                let message = error_chain(&e);
                warn!(error = %message, "remote cleanup failed");
                StageOutcome::warn(STAGE_CLEANUP_REMOTE, message)
            },
        };
        self.record(outcome);

        report
    }

    // ── run ───────────────────────────────────────────────────────────────────

    /// create → upload → cleanup.  Fails only if no local artifact was made.
    pub fn run(&mut self) -> Result<RunReport, DumpError> {
        info!(database = %self.cfg.database.name, "starting database backup");

        let artifact = self.create_backup()?;
        let uploaded = self.upload(&artifact);
        let cleanup = self.cleanup();

        info!(
            artifact = %artifact.name,
            uploaded = uploaded.is_some(),
            "backup process completed"
        );
        Ok(RunReport {
            artifact,
            uploaded,
            cleanup,
        })
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}

// ─── Tests ────────────────────────────────────────────────────────────────────
