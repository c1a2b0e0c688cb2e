//! Otter Storage - `@system.storage` for Otter runtime
//!
//! Exposes the application's string preferences to scripts as four
//! promise-returning functions. Results are reported through optional
//! callbacks; the promise always resolves with `undefined`.
//!
//! # Usage
//!
//! ```typescript
//! import storage from "@system.storage";
//!
//! await storage.set({ key: "theme", value: "dark" });
//! await storage.get({
//!     key: "theme",
//!     default: "light",
//!     success(value) { console.log(value); },      // "dark"
//!     fail(message, code) { console.error(code, message); },
//!     complete() { console.log("done"); },
//! });
//! await storage.delete({ key: "theme" });
//! await storage.clear({});
//! ```
//!
//! Keys are limited to 32 bytes, values and defaults to 128 bytes. The store
//! is `<preferences dir>/default.xml`.

mod bridge;
pub mod code;
pub mod config;
pub mod error;
pub mod module;
pub mod request;
pub mod value;

pub use bridge::{MAX_KEY_LENGTH, MAX_VALUE_LENGTH, PreferenceBridge, Promise};
pub use code::ResultCode;
pub use config::{AppContext, StaticContext, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use module::{MODULE_NAME, StorageModule, storage_ops};
pub use request::{Callbacks, Operation, Request};
pub use value::{JsFunction, JsValue, ValueType};
