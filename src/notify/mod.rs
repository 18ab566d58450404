//! Push subscriptions and notification fan-out.
//!
//! A broadcast snapshots every stored subscription, sends the same
//! encrypted payload to each endpoint concurrently, and deletes the
//! subscriptions the push service reports as gone.
pub mod client;
pub mod db;
pub mod fanout;
pub mod models;
pub mod store;
pub use client::*;
pub use db::*;
pub use fanout::*;
pub use models::*;
pub use store::*;
