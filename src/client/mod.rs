//! Client-side collaborators of the feed core: local visitor state and the admin console.

mod admin;
mod local_state;

pub use admin::*;
pub use local_state::*;
