//! Store traits implemented by the SeaORM adapters (and by in-memory doubles
//! in tests).

mod traits;

pub use traits::*;
