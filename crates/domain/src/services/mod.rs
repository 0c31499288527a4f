//! Disclosure metering, config caching, side-effect dispatch and telemetry.

pub mod admin_auth;
pub mod affiliate;
pub mod config_cache;
pub mod disclosure;
pub mod policy;
pub mod settlement;
pub mod sink;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use admin_auth::*;
pub use affiliate::*;
pub use config_cache::*;
pub use disclosure::*;
pub use policy::*;
pub use settlement::*;
pub use sink::*;
pub use telemetry::*;
