//! `db-backup init`: write a starter config.

use std::{fs, path::Path};

use anyhow::{Result, bail};

use crate::ui::StageOutcome;

/// Commented starter config.  Every value shown is either the built-in
/// default or a placeholder the operator must replace.
pub const TEMPLATE: &str = r#"# db-backup configuration.
#
# Every setting can also be given as an environment variable (or in a .env
# file next to this one); the environment wins over this file.

[database]
user         = "backup"      # DB_USER
password     = "change-me"   # DB_PASS
host         = "localhost"   # DB_HOST
port         = 3306          # DB_PORT
name         = "mydb"        # DB_NAME
dump_command = "mysqldump"   # DB_DUMP_COMMAND

[drive]
service_account_file = "service-account.json"   # GOOGLE_SERVICE_ACCOUNT_FILE
# folder_id          = ""                       # GOOGLE_DRIVE_FOLDER_ID

[backup]
dir            = "./backups"   # BACKUP_LOCAL_DIR
keep           = 7             # MAX_BACKUPS_TO_KEEP
retention_days = 30            # BACKUP_RETENTION_DAYS (not applied yet)

[log]
file = "db_backup.log"         # BACKUP_LOG_FILE; "" disables the log file
"#;

/// Scaffold `path`, refusing to overwrite an existing file.
pub fn run(path: &Path) -> Result<()> {
    let label = format!("Init ({})", path.display());

    if path.exists() {
        let outcome = StageOutcome::failed(
            &label,
            format!("{} already exists; refusing to overwrite", path.display()),
            "",
        );
        outcome.print();
        bail!("{} already exists", path.display());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, TEMPLATE)?;

    StageOutcome::ok(&label, "edit it, then run `db-backup --print-config`").print();
    Ok(())
}
