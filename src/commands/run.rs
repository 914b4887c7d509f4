//! Default command, run when no subcommand is given.
//!
//! # Stages (in order)
//!
//! | # | Stage            | Flag to skip    | Description                           |
//! |---|------------------|-----------------|---------------------------------------|
//! | 1 | Dump             |                 | Dump + gzip into the backup directory |
//! | 2 | Upload           | `--no-upload`   | Resumable upload to Google Drive      |
//! | 3 | Cleanup (local)  | `--no-cleanup`  | Keep the newest `keep` local files    |
//! | 4 | Cleanup (remote) | `--no-cleanup`  | Same on Drive, if a session is open   |
//!
//! Only a Dump failure makes the process exit non-zero.

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    cli::Cli,
    config::Config,
    remote::{RemoteSession, drive::DriveConnector},
    ui::{QuietReporter, Reporter, TerminalReporter, print_summary},
    workflow::{BackupWorkflow, RunOptions},
};

pub fn options(cli: &Cli) -> RunOptions {
    RunOptions {
        upload: !cli.no_upload,
        cleanup: !cli.no_cleanup,
    }
}

/// Execute the backup workflow against Google Drive.
pub fn run(cli: &Cli, cfg: &Config) -> Result<()> {
    let terminal = TerminalReporter::default();
    let quiet = QuietReporter;
    let reporter: &dyn Reporter = if cli.quiet { &quiet } else { &terminal };

    let session = RemoteSession::new(Box::new(DriveConnector::new(
        &cfg.drive.service_account_file,
    )));

    if !cli.quiet {
        println!();
    }

    let mut workflow = BackupWorkflow::new(cfg, session, reporter, options(cli))
        .context("preparing the backup directory")?;
    let result = workflow.run();

    if !cli.quiet {
        print_summary(workflow.outcomes());
    }

    let report = result.context("backup failed")?;
    info!(
        artifact = %report.artifact.path.display(),
        created = %report.artifact.created.format("%Y-%m-%d %H:%M:%S"),
        uploaded = report.uploaded.is_some(),
        local_removed = report.cleanup.local_removed.len(),
        remote_removed = report.cleanup.remote_removed.len(),
        "run finished"
    );
    Ok(())
}
