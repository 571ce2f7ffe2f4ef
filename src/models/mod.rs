//! Data models for the incident portal.
//!
//! Wire names are camelCase so the web front end and the Rust client share one contract.

mod incident;
mod log;
mod prayer;
mod query;
mod source;
mod user;

pub use incident::*;
pub use log::*;
pub use prayer::*;
pub use query::*;
pub use source::*;
pub use user::*;
