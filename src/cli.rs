//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  The `Cli` struct is parsed once in `main` and then
//! passed (by reference) into the command handlers.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI arguments, shared across every subcommand.
#[derive(Parser, Debug)]
#[command(
    name    = "db-backup",
    about   = "Dump a database, gzip it, ship it to Google Drive, prune old copies",
    version,
    // Show a compact two-column help layout.
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Path to the configuration file.
    ///
    /// Defaults to `db-backup.toml` in the current working directory.  The
    /// file is optional: every setting can also come from the environment
    /// (or a `.env` file), which takes precedence over the file.
    #[arg(short, long, default_value = "db-backup.toml")]
    pub config: PathBuf,

    /// Subcommand to run.  Omit to run the backup workflow.
    #[command(subcommand)]
    pub command: Option<Subcommand>,

    /// Print the resolved configuration (password redacted) and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Keep the dump local; skip the Drive upload.
    ///
    /// Remote cleanup is skipped as well since no Drive session is opened.
    #[arg(long)]
    pub no_upload: bool,

    /// Skip pruning old backups, locally and on Drive.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Only print stages that warned or failed.
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase stderr log verbosity (`-v` info, `-vv` debug).
    ///
    /// `RUST_LOG` overrides this when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
pub enum Subcommand {
    /// Scaffold a commented `db-backup.toml` in the current directory.
    ///
    /// Exits with an error if the file already exists to avoid accidental
    /// overwrites.
    Init,

    /// List existing backups for the configured database, newest first.
    List {
        /// Also list the copies stored on Google Drive.
        #[arg(long)]
        remote: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("db-backup").chain(extra.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.config, PathBuf::from("db-backup.toml"));
        assert!(cli.command.is_none());
        assert!(!cli.no_upload);
        assert!(!cli.no_cleanup);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn verbose_counts() {
        assert_eq!(parse(&["-vv"]).verbose, 2);
    }

    #[test]
    fn list_remote_flag() {
        let cli = parse(&["list", "--remote"]);
        assert_eq!(cli.command, Some(Subcommand::List { remote: true }));
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
