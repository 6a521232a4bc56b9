/*!
 * SQLite persistence for the translation cache.
 *
 * Controlled by `sync.persist_cache` (on by default), so repeated runs over
 * the same story do not pay for translations they already have.
 */

pub mod connection;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use repository::Repository;
