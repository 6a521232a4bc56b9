/*!
 * SQLite handle for the translation cache.
 *
 * rusqlite is synchronous, so async callers hop onto tokio's blocking pool.
 * The connection sits behind one mutex; cache persistence is a couple of
 * bulk statements per run and never contends.
 */

use anyhow::{anyhow, Context, Result};
use log::debug;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;

/// Shared SQLite connection
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    location: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open the cache database at `path`, or at the per-user default location
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let location = match path {
            Some(path) => path.to_path_buf(),
            None => default_cache_path()?,
        };
        if let Some(dir) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create cache directory {:?}", dir))?;
        }

        let conn = Connection::open(&location).with_context(|| format!("Failed to open cache database {:?}", location))?;
        Self::ready(conn, location)
    }

    /// Throwaway database, used by tests
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::ready(conn, PathBuf::from(":memory:"))
    }

    fn ready(conn: Connection, location: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        debug!("Translation cache database ready at {:?}", location);
        Ok(Self {
            location,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.location
    }

    /// Run `f` on the calling thread
    pub fn execute<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&self.conn.lock())
    }

    /// Run `f` on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |conn| f(conn)).await
    }

    /// Run `f` in one transaction on the blocking pool; any error rolls back
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&mut conn.lock()))
            .await
            .context("SQLite task panicked")?
    }
}

/// `<local data dir>/storyforge/translation_cache.db`
pub fn default_cache_path() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join("storyforge").join("translation_cache.db"))
        .ok_or_else(|| anyhow!("No data directory for the translation cache"))
}
