//! Parboil core library
//!
//! Template repositories, field resolution, rendering and project
//! compilation.

pub mod config;
pub mod context;
pub mod error;
pub mod fields;
pub mod fs;
pub mod project;
pub mod prompt;
pub mod renderer;
pub mod shell;
pub mod tasks;
pub mod templates;
pub mod utils;

pub use error::{Error, Result};
