//! Client core for the incident feed.
//!
//! [`FeedController`] owns pagination and search state; [`PrayerReconciler`] applies
//! prayer commitments to that same state. Both reach the data service only through
//! [`crate::gateway::FeedGateway`].

mod controller;
#[cfg(test)]
pub(crate) mod mock;
mod reconciler;

pub use controller::*;
pub use reconciler::*;
