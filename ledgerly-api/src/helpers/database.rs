use std::path::PathBuf;

/// Returns the path to the ledgerly database based on the operating system
///
/// # Platform-specific paths
///
/// - **macOS**: `~/Library/Application Support/ledgerly/db.sqlite`
/// - **Linux**: `~/.local/share/ledgerly/db.sqlite`
/// - **Windows**: `%LOCALAPPDATA%\ledgerly\db.sqlite`
pub fn get_db_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(data_dir.join("ledgerly").join("db.sqlite"))
}

/// Opens (creating if needed) the database at `path`, or at the default location
pub fn initialize_database(
    path: Option<PathBuf>,
) -> anyhow::Result<(std::sync::Arc<crate::database::Database>, PathBuf)> {
    let db_path = match path {
        Some(path) => path,
        None => get_db_path()?,
    };

    let db = crate::database::Database::new(&db_path)?;
    Ok((std::sync::Arc::new(db), db_path))
}
