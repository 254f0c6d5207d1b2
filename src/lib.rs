//! Offline-first attendance and camp-group coordination for a Scout OSM
//! client.
//!
//! Reads go cache-first through [`storage::Store`]; the camp-groups screen
//! is a [`view::CampGroupsView`] whose [`mutation::MutationEngine`] applies
//! changes optimistically and reconciles them against OSM.

pub mod attendance;
pub mod auth;
pub mod config;
pub mod error;
pub mod flexi;
pub mod models;
pub mod mutation;
pub mod network;
pub mod notify;
pub mod osm;
pub mod projection;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod util;
pub mod view;

#[cfg(test)]
mod testing;

pub use error::CoreError;
pub use state::AppState;
