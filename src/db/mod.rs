//! Database module: session pooling, query execution, result types.

mod executor;
mod models;
mod session;

pub use executor::*;
pub use models::*;
pub use session::*;
