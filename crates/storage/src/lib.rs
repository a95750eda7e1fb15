pub mod error;
pub mod records;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use records::*;
pub use sqlite::SqliteStore;
pub use traits::*;
