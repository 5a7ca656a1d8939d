//! Core domain models for deployments
//!
//! This module defines the data structures that describe pipelines, steps,
//! their configuration and the outcome of a run.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod presets;
pub mod result;
pub mod state;
pub mod step;
pub mod template;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use result::*;
pub use state::*;
pub use step::*;
