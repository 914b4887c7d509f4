//! Subcommand handlers.
//!
//! Each file in this module corresponds to one user-facing command:
//!
//! | File          | Invocation            | Description                          |
//! |---------------|-----------------------|--------------------------------------|
//! | `init.rs`     | `db-backup init`      | Scaffold a `db-backup.toml`          |
//! | `list.rs`     | `db-backup list`      | Show existing local / Drive backups  |
//! | `run.rs`      | `db-backup` (default) | Dump, upload, prune                  |

pub mod init;
pub mod list;
pub mod run;
