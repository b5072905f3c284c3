//! Extension background worker: the single outbound connection to the
//! broker, command dispatch routing, cursor persistence, screenshot
//! stitching, and the handful of events it pushes unprompted.

pub mod backoff;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod screenshot;

#[cfg(target_arch = "wasm32")]
pub mod bindings;
#[cfg(target_arch = "wasm32")]
pub mod chrome;
#[cfg(target_arch = "wasm32")]
pub mod connection;
#[cfg(target_arch = "wasm32")]
pub mod execute;

pub use backoff::{Backoff, BackoffConfig};
pub use cursor::CursorStore;
pub use dispatch::{route, waits_for_tab_complete, DispatchPath, TAB_COMPLETE_TIMEOUT_MS};
pub use error::BridgeError;
#[cfg(target_arch = "wasm32")]
pub use execute::Dispatcher;
