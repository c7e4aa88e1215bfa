//! Herald API server: notification inbox, realtime socket and producer
//! endpoints.

pub mod hub;
pub mod middleware;
pub mod routes;
pub mod state;
