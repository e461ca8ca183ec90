// src/config/mod.rs

//! Settings loading and validation for buildlane.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate it (`validate.rs`).
//! - Resolve effective values for the coordinator (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    ApplicationSection, OutputSection, ProjectSection, ProtocolSection, RawSettingsFile,
    SettingsFile,
};
pub use settings::split_parameters;
pub use validate::validate_settings;
