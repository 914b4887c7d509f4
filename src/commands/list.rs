//! `db-backup list`: show what retention currently sees.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use console::style;

use crate::{
    artifact::{self, LocalEntry, bytes_to_mb},
    config::Config,
    remote::{Connector, RemoteQuery, RemoteRecord, drive::DriveConnector},
};

fn local_line(entry: &LocalEntry, kept: bool) -> String {
    let when: DateTime<Local> = DateTime::<Local>::from(entry.modified);
    format!(
        "{}  {}  {:>9.2} MB  {}",
        marker(kept),
        when.format("%Y-%m-%d %H:%M:%S"),
        bytes_to_mb(entry.size),
        entry.name
    )
}

fn remote_line(record: &RemoteRecord, kept: bool) -> String {
    let size = record
        .size
        .map_or_else(|| "        ?   ".to_string(), |s| format!("{:>9.2} MB", bytes_to_mb(s)));
    format!(
        "{}  {}  {}  {}  {}",
        marker(kept),
        record.created.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        size,
        record.name,
        style(&record.id).dim()
    )
}

/// `*` for entries the next cleanup keeps, blank for ones it would delete.
fn marker(kept: bool) -> &'static str {
    if kept { "*" } else { " " }
}

pub fn run(cfg: &Config, remote: bool) -> Result<()> {
    let source = &cfg.database.name;
    let keep = cfg.backup.keep;

    let local = artifact::list_local(&cfg.backup.dir, source)
        .with_context(|| format!("listing {}", cfg.backup.dir.display()))?;
    println!(
        "{} {} ({} found, keeping {keep})",
        style("Local").bold(),
        cfg.backup.dir.display(),
        local.len()
    );
    for (i, entry) in local.iter().enumerate() {
        println!("  {}", local_line(entry, i < keep));
    }

    if !remote {
        return Ok(());
    }

    let store = DriveConnector::new(&cfg.drive.service_account_file)
        .connect()
        .context("connecting to Google Drive")?;
    let query = RemoteQuery::for_source(source, cfg.drive.folder_id.as_deref());
    let mut records = store.list(&query).context("listing Drive backups")?;
    records.retain(|r| query.matches(&r.name));
    records.sort_by(|a, b| b.created.cmp(&a.created));

    println!();
    println!(
        "{} ({} found, keeping {keep})",
        style("Google Drive").bold(),
        records.len()
    );
    for (i, record) in records.iter().enumerate() {
        println!("  {}", remote_line(record, i < keep));
    }

    Ok(())
}
