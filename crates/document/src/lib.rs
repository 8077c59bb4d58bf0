pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::DocumentError;
pub use sqlite::SqliteDocument;
pub use traits::*;
