//! Bazaar operator library
//!
//! Two control loops keep the cluster's default catalog sources converged:
//! the catalog-source loop restores drifted or deleted defaults, and the hub
//! loop applies the cluster-wide enable/disable policy, sharing its observed
//! state with the catalog loop through [`state::HubState`].

pub mod controller;
pub mod defaults;
pub mod registry;
pub mod runner;
pub mod state;
pub mod store;
pub mod watch;

pub use bazaar_common::{Error, Result};
