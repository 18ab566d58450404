mod config;
pub mod db;
pub mod logging;
pub use config::*;
