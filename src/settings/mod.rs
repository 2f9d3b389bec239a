//! Secure settings persistence: encrypted key/value rows plus named
//! configuration profiles backed by SQLite.

pub mod encryption;
pub mod store;

pub use self::store::{SettingInfo, SettingValue, SettingsStore};
