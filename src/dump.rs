//! Dump + compress.
//!
//! 1. Run the dump utility with stdout redirected into `<name>.sql`.
//! 2. gzip `<name>.sql` into `<name>.sql.gz`.
//! 3. Remove `<name>.sql`.
//!
//! Any failure removes whatever partial files this run created before the
//! error is returned, so a failed run leaves the backup directory as it found
//! it.  Both files are created exclusively: a name taken by a run in the same
//! second is reported as [`DumpError::Exists`] and never overwritten.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use chrono::{DateTime, Local};
use flate2::{Compression, write::GzEncoder};
use tracing::{debug, info, warn};

use crate::{
    artifact::{self, BackupArtifact},
    config::DatabaseConfig,
    error::DumpError,
    runner::{build_dump_args, redacted},
};

/// Dump `db` into `dir` and compress it, stamped with `at`.
pub fn create_backup(
    db: &DatabaseConfig,
    dir: &Path,
    at: DateTime<Local>,
) -> Result<BackupArtifact, DumpError> {
    let dump_name = artifact::dump_file_name(&db.name, at);
    let dump_path = dir.join(&dump_name);
    let gz_name = format!("{dump_name}.gz");
    let gz_path = dir.join(&gz_name);

    let args = build_dump_args(db);
    info!(database = %db.name, path = %dump_path.display(), "starting database dump");
    debug!(command = %redacted(&args), "dump command");

    if gz_path.exists() {
        return Err(DumpError::Exists { path: gz_path });
    }

    match run_dump(&args, &dump_path) {
        Ok(()) => {},
        Err(e @ DumpError::Exists { .. }) => return Err(e),
        Err(e) => {
            remove_partial(&[&dump_path]);
            return Err(e);
        },
    }
    info!(path = %dump_path.display(), "database dump written");

    let size = match compress(&dump_path, &gz_path) {
        Ok(size) => size,
        Err(e @ DumpError::Exists { .. }) => {
            remove_partial(&[&dump_path]);
            return Err(e);
        },
        Err(e) => {
            remove_partial(&[&dump_path, &gz_path]);
            return Err(e);
        },
    };

    if let Err(source) = fs::remove_file(&dump_path) {
        remove_partial(&[&dump_path, &gz_path]);
        return Err(DumpError::Write {
            path: dump_path,
            source,
        });
    }

    let artifact = BackupArtifact {
        name: gz_name,
        path: gz_path,
        size,
        created: at,
    };
    info!(
        artifact = %artifact.name,
        size_mb = %format!("{:.2}", artifact.size_mb()),
        "backup compressed"
    );
    Ok(artifact)
}

/// Run `args`, sending stdout to a fresh file at `out`.
///
/// Stderr is captured and carried in [`DumpError::Exited`] on non-zero exit.
pub fn run_dump(args: &[String], out: &Path) -> Result<(), DumpError> {
    let (program, rest) = args.split_first().ok_or(DumpError::EmptyCommand)?;

    let file = create_new(out)
        .map_err(|source| exists_or(out, source, |path, source| DumpError::Write { path, source }))?;

    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| DumpError::Spawn {
            program: program.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(DumpError::Exited {
            program: program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// gzip `src` into `dst`, returning the compressed size.
pub fn compress(src: &Path, dst: &Path) -> Result<u64, DumpError> {
    let err = |source: io::Error| DumpError::Compress {
        path: dst.to_path_buf(),
        source,
    };

    let created = create_new(dst).map_err(|source| {
        exists_or(dst, source, |path, source| DumpError::Compress { path, source })
    })?;
    let writer = BufWriter::new(created);
    let mut reader = BufReader::new(File::open(src).map_err(err)?);
    let mut encoder = GzEncoder::new(writer, Compression::default());
    io::copy(&mut reader, &mut encoder).map_err(err)?;
    let mut writer = encoder.finish().map_err(err)?;
    writer.flush().map_err(err)?;
    drop(writer);

    Ok(fs::metadata(dst).map_err(err)?.len())
}

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// `Exists` for a name collision, otherwise the error `other` builds.
fn exists_or(
    path: &Path,
    source: io::Error,
    other: impl FnOnce(PathBuf, io::Error) -> DumpError,
) -> DumpError {
    if source.kind() == io::ErrorKind::AlreadyExists {
        DumpError::Exists {
            path: path.to_path_buf(),
        }
    } else {
        other(path.to_path_buf(), source)
    }
}

fn remove_partial(paths: &[&PathBuf]) {
    for p in paths {
        match fs::remove_file(p) {
            Ok(()) => debug!(path = %p.display(), "removed partial file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %p.display(), error = %e, "could not remove partial file"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
