//! # RVoIP Routing Core
//!
//! Script-style request routing for SIP proxies built on rvoip.
//!
//! A proxy hands each parsed request to the [`RoutingEngine`], which walks a
//! fixed graph of named routes (REQINIT, NATDETECT, WITHINDLG, AUTH, ...) and
//! drives the host SIP core through the [`CoreActions`] facade until exactly
//! one terminal [`Disposition`] is reached.
//!
//! ## Architecture
//!
//! ```text
//!   host transport ──► RoutingEngine::route(&mut Message)
//!                            │
//!                            ├── routes::ROUTE_TABLE   (RouteId → fn)
//!                            │        │
//!                            │        ▼
//!                            └── CoreActions ──► dyn HostCore (native i32 codes)
//!                                     │
//!                                     ▼
//!                               Disposition
//! ```
//!
//! - `message`: the in-flight message context (method, URIs, headers, flags)
//! - `facade`: the single seam to the host core, plus a scripted in-memory host
//! - `routes`: the named route table
//! - `engine`: the dispatcher and [`Disposition`]
//! - `config`: process-wide routing configuration
//! - `logging`: tracing subscriber setup
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_routing_core::{Disposition, Message, RouterConfig, RoutingEngine, ScriptedHost};
//!
//! let host = Arc::new(ScriptedHost::new());
//! let engine = RoutingEngine::new(host.clone(), RouterConfig::default());
//!
//! let mut cancel = Message::request("CANCEL", "sip:bob@example.com").build();
//! // No matching transaction: the CANCEL is silently discarded.
//! assert_eq!(engine.route(&mut cancel), Disposition::Dropped);
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod facade;
pub mod logging;
pub mod message;
pub mod routes;

// Re-export key types
pub use config::{AuthConfig, CallbackNames, NatConfig, PstnConfig, RouterConfig};
pub use engine::{Disposition, Reply, RoutingEngine};
pub use errors::{RoutingError, RoutingResult};
pub use facade::{CoreActions, HostCore, LookupResult, ReturnCode, ScriptedHost};
pub use message::{Message, MessageFlags, MessageId, Method, RouteFlag, SipUri};
pub use routes::{RouteId, RouteOutcome};
