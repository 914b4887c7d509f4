//! Dump command construction helpers.
//!
//! This module is responsible for *building* the argument list passed to the
//! dump utility.  It does **not** execute anything; process execution lives
//! in [`crate::dump`], so every function here is pure and tested without
//! spawning child processes.

use crate::config::DatabaseConfig;

/// Flags that make `mysqldump` take a consistent snapshot without locking
/// tables, and stream rows instead of buffering whole tables in memory.
pub const CONSISTENCY_FLAGS: [&str; 3] = ["--single-transaction", "--quick", "--lock-tables=false"];

// ─── Dump command ─────────────────────────────────────────────────────────────

/// Builds the full argument vector for the dump:
///
/// ```text
/// <dump_command…>  --user=U  --password=P  --host=H  --port=N
///                  --single-transaction  --quick  --lock-tables=false  <db>
/// ```
///
/// `dump_command` is split on whitespace so wrappers like
/// `docker exec db mysqldump` work without a shell.
pub fn build_dump_args(db: &DatabaseConfig) -> Vec<String> {
    let mut cmd: Vec<String> = db.dump_command.split_whitespace().map(String::from).collect();
    cmd.extend([
        format!("--user={}", db.user),
        format!("--password={}", db.password),
        format!("--host={}", db.host),
        format!("--port={}", db.port),
    ]);
    cmd.extend(CONSISTENCY_FLAGS.iter().map(|f| (*f).to_string()));
    cmd.push(db.name.clone());
    cmd
}

/// Copy of `args` safe to log: the `--password=` value is masked.
pub fn redacted(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.starts_with("--password=") {
                "--password=***".to_string()
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
