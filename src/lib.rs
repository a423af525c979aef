//! Parboil: project boilerplate generator
//!
//! Templates are installed into a [`Repository`](core::templates::Repository)
//! and compiled into a target directory by a [`Project`](core::project::Project).
#![deny(unsafe_code)]

pub mod core;
