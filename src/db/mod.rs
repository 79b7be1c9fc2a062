pub mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::signing::DownloadSigner;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Issues and verifies download URL tokens
    pub signer: DownloadSigner,
    /// Root directory that `files.storage_path` is relative to
    pub files_dir: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        // enforced per connection; cascades and SET NULL depend on it
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder().max_size(10).build(manager)
}
