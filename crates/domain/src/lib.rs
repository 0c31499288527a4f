//! Domain-level building blocks shared by the storage adapters and the HTTP
//! binary: provider/config models, the store traits the adapters implement,
//! and the services that meter contact disclosure and keep admin-editable
//! configuration coherent.

pub mod config;
pub mod model;
pub mod services;
pub mod storage;

pub use model::*;
pub use storage::*;
