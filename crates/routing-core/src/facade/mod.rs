//! Core action facade
//!
//! The single seam between routing logic and the host SIP core:
//!
//! - [`HostCore`]: native operations reporting raw `i32` codes
//! - [`CoreActions`]: typed wrapper the routes call, converting codes to
//!   predicates and enforcing one terminal action per message
//! - [`ScriptedHost`]: deterministic in-memory host for replay and tests

mod actions;
mod host;
pub mod scripted;

pub use actions::{CoreActions, LookupResult};
pub use host::{CallbackKind, HostCore, ReturnCode};
pub use scripted::{HostCall, RelaySnapshot, ScriptedHost, ScriptedHostConfig, SentReply};
