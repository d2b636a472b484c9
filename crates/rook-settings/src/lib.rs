//! # rook-settings
//!
//! Configuration loading with layered sources:
//!
//! 1. Compiled defaults ([`RookSettings::default()`])
//! 2. `~/.rook/settings.json` (or an explicit path), deep-merged over defaults
//! 3. `ROOK_*` environment variables (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, rook_home, settings_path};
pub use types::{LoggingSettings, RookSettings, ServerSettings, SessionSettings, StoreSettings};
