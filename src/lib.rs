//! Directory of designated pilot examiners with checkride reviews
//! ("gouges"), aggregate ratings and helpfulness voting, served as a JSON
//! API over SQLite.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod stats;
