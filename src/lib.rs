// Library exports for agora
// This allows integration tests and external code to use agora modules

pub mod auth;
pub mod avatar;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod sanitize;
pub mod state;
pub mod views;
