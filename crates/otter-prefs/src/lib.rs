//! Otter Prefs - string preferences store
//!
//! A small file-backed key/value store holding string preferences. Each store
//! is a single XML file; instances are shared per path through
//! [`PreferencesHelper`].
//!
//! # Usage
//!
//! ```no_run
//! use otter_prefs::PreferencesHelper;
//!
//! let prefs = PreferencesHelper::get_preferences("/data/app/preferences/default.xml")?;
//! prefs.put_string("theme", "dark")?;
//! prefs.flush()?;
//! assert_eq!(prefs.get_string("theme", "light"), "dark");
//! # Ok::<(), otter_prefs::PrefsError>(())
//! ```

pub mod errno;
mod helper;
mod preferences;
mod xml;

pub use errno::{PrefsError, PrefsResult};
pub use helper::PreferencesHelper;
pub use preferences::{MAX_KEY_LENGTH, MAX_VALUE_LENGTH, Preferences};
