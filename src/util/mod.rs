//! Utility modules

pub mod paths;

pub use paths::{display_path, relative_to, slash_path, source_stem, unit_label};
