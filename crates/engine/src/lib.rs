//! Handle registry, honeypot detection, and the human-interaction
//! pipelines (click/type/scroll/clear) that sit behind the page-bridge's
//! command dispatch (spec.md §4.3).
//!
//! Everything here is plain, host-independent logic. DOM access itself is
//! abstracted behind [`dom::DomAccess`] so the pipelines can be driven by a
//! fake implementation in tests on any target; a real `web_sys`-backed
//! implementation lives in the `page-bridge` crate, compiled only for
//! `wasm32-unknown-unknown`.

pub mod click;
pub mod clear;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod handles;
pub mod honeypot;
pub mod injection;
pub mod keyboard;
pub mod scroll;
pub mod timing;
pub mod typing;

pub use dom::DomAccess;
pub use error::EngineError;
pub use handles::{HandleError, HandleRegistry, SweepSchedule};
pub use honeypot::{detect as detect_trap, BoundingBox, ElementSnapshot, TrapReason};
