//! Shared utilities for the Vigil server and client.

pub mod logger;
pub mod time;
