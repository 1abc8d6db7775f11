//! # signlink-settings
//!
//! Configuration for the signlink client, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`SignlinkSettings::default()`]
//! 2. **User file**: `~/.signlink/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SIGNLINK_*` overrides (highest priority)
//!
//! The agent binary applies its CLI flags on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
    validate,
};
pub use types::*;
