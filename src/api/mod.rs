pub mod routes;
mod server;
pub use server::{app, engine_from_config, serve};
pub mod public;
mod state;
pub use state::AppState;
