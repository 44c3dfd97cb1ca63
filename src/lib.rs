pub mod config;
pub mod db;
pub mod model;
pub mod plex;
pub mod reconcile;
pub mod resolver;
pub mod scheduler;
pub mod secrets;
pub mod server;
pub mod state;
