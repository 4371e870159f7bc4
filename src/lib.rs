pub mod api;
pub mod config;
pub mod db;
pub mod hardware;
pub mod monitor;
pub mod stats;
