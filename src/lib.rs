// src/lib.rs
// aider API - drives the aider CLI over HTTP

pub mod chat;
pub mod config;
pub mod error;
pub mod runner;
pub mod server;
pub mod staging;

pub use error::{AiderApiError, Result};
