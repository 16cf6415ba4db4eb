pub mod api;
pub mod auth;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;
pub mod rate_limit;
pub mod server;
pub mod status;
pub mod validation;
