//! Dataset bootstrap: rebuild the tile database from its source of truth.
//!
//! The dataset file is treated as a disposable artifact. Every server start
//! deletes it, re-ingests the configured source through the spatial
//! extension, and closes the write handle before the first reader opens.
//! Running the bootstrap twice in a row therefore converges on the same
//! state as running it once.

use std::path::{Path, PathBuf};
use std::{fs, io};

use duckdb::params;
use tracing::debug;

use crate::config::Config;
use crate::error::BootstrapError;
use crate::source::{quote_ident, quote_literal};
use crate::store::WriteHandle;

/// What a completed bootstrap produced.
#[derive(Clone, Debug)]
pub struct BootstrapSummary {
    /// Rows ingested into the tile table.
    pub features: u64,
}

/// Rebuilds the dataset at `config.database` from `config.source`.
///
/// The write handle is opened and closed entirely within this call; when it
/// returns, the dataset file is complete on disk and only ever opened
/// read-only again.
pub fn initialize_dataset(config: &Config) -> Result<BootstrapSummary, BootstrapError> {
    // Refuse before deleting anything if there is no source to rebuild from.
    fs::metadata(&config.source).map_err(|source| BootstrapError::Source {
        path: config.source.clone(),
        source,
    })?;

    remove_if_present(&config.database)?;
    remove_if_present(&wal_path(&config.database))?;

    let table = quote_ident(&config.table);
    let writer = WriteHandle::open(&config.database)?;

    debug!("installing spatial extension");
    writer.execute_batch("INSTALL spatial; LOAD spatial;")?;

    debug!(source = %config.source.display(), "ingesting source dataset");
    writer.execute_batch(&format!(
        "CREATE TABLE {} AS SELECT * FROM st_read({});",
        table,
        quote_literal(&config.source.to_string_lossy()),
    ))?;

    let geometry_columns: i64 = writer.query_row(
        "SELECT count(*) FROM information_schema.columns \
         WHERE table_name = ? AND column_name = ? AND data_type = 'GEOMETRY'",
        params![config.table, config.geometry_column],
        |row| row.get(0),
    )?;
    if geometry_columns == 0 {
        return Err(BootstrapError::MissingGeometryColumn {
            table: config.table.clone(),
            column: config.geometry_column.clone(),
        });
    }

    let features: i64 = writer.query_row(
        &format!("SELECT count(*) FROM {}", table),
        [],
        |row| row.get(0),
    )?;

    writer.close()?;
    debug!(features, "dataset rebuilt");

    Ok(BootstrapSummary {
        features: features as u64,
    })
}

fn wal_path(database: &Path) -> PathBuf {
    let mut name = database.as_os_str().to_owned();
    name.push(".wal");
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> Result<(), BootstrapError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale dataset file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BootstrapError::Reset {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wal_path_appends_to_the_full_file_name() {
        assert_eq!(
            PathBuf::from("/var/lib/tiles.db.wal"),
            wal_path(Path::new("/var/lib/tiles.db"))
        );
    }

    #[test]
    fn missing_source_fails_before_touching_the_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("tiles.db");
        fs::write(&database, b"previous build").unwrap();

        let config = Config {
            database: database.clone(),
            source: dir.path().join("does-not-exist.geojson"),
            ..Config::default()
        };

        assert!(matches!(
            initialize_dataset(&config),
            Err(BootstrapError::Source { .. })
        ));
        // The stale dataset survives a refused bootstrap.
        assert_eq!(b"previous build".to_vec(), fs::read(&database).unwrap());
    }

    #[test]
    fn remove_if_present_ignores_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_present(&dir.path().join("ghost.db")).is_ok());

        let real = dir.path().join("real.db");
        fs::write(&real, b"x").unwrap();
        assert!(remove_if_present(&real).is_ok());
        assert!(!real.exists());
    }
}
