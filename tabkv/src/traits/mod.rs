mod macros;
mod schema;
mod storage;

pub use schema::*;
pub use storage::*;
