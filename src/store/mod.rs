//! Persistence: a namespaced JSON key/value store and typed session access.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod session;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::InMemoryStore;
pub use session::{Session, SessionSnapshot};
pub use traits::{NAMESPACE, SessionStore, keys};
