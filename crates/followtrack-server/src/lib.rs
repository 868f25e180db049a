//! followtrack server library: HTTP routes, configuration, logging and
//! background scheduling. Kept apart from main.rs for integration testing.

pub mod config;
pub mod logging;
pub mod routes;
pub mod scheduler;
pub mod state;
