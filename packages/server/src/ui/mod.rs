//! Dashboard HTTP / WebSocket server.

mod handler;
mod runner;
mod signal;
pub mod state;

pub use runner::{app, run, serve};
