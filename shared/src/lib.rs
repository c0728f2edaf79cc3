//! Shared types and models for the AgroTIC farm management platform
//!
//! This crate contains the domain types and pure calculations shared between
//! the backend, the browser front end (via WASM) and the test suites.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
