//! Installed templates and their on-disk format
//!
//! - [`manifest`]: the `parboil.json` project descriptor
//! - [`metadata`]: the `.parboil` install metadata
//! - [`template`]: a single template loaded from disk
//! - [`repository`]: the catalog of installed templates

pub mod manifest;
pub mod metadata;
pub mod repository;
pub mod template;

pub use manifest::{DESCRIPTOR_FILE, Descriptor, FileOptions};
pub use metadata::{META_FILE, Metadata, SourceType};
pub use repository::{InstallOptions, Repository};
pub use template::Template;
