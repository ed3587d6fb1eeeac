use anyhow::{Context, Result};
use env_logger::{Builder, Target, WriteStyle};
use log::info;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Routes log records into `path`, since the terminal belongs to the UI.
pub fn init(path: &Path, filter: &str) -> Result<()> {
    let file = open_log_file(path)?;

    let mut builder = Builder::new();
    builder
        .parse_filters(filter)
        .target(Target::Pipe(Box::new(file)))
        .write_style(WriteStyle::Never)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.target(),
                record.args()
            )
        });
    builder
        .try_init()
        .context("failed to initialize logger")?;

    info!("logging to {} with filter {filter}", path.display());
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_log_directories() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("trackdeck.log");

        open_log_file(&path).expect("open");

        assert!(path.exists());
    }
}
