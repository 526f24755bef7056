//! linkrelay - a single-owner chat relay that saves links to Linkding or Readeck.
//!
//! An inbound chat event flows through these stages:
//!
//! ```text
//!  Gateway (Telegram)
//!       │  GatewayEvent::MessageReceived
//!       ▼
//!  gateway::route_events()            one task per event
//!       ▼
//!  gate::Guarded                      AccessGate: owner / topic check
//!       ▼
//!  engine::ConversationEngine         url → [service] → tags
//!       │  on the tags turn
//!       ▼
//!  bookmark::Submitter                one POST, status classified
//!       ▼
//!  GatewayCommand::SendMessage        outcome back to the owner
//! ```

pub mod bookmark;
pub mod config;
pub mod engine;
pub mod gate;
pub mod gateway;
pub mod session;
pub mod sync;

pub use config::{Config, ConfigError};
pub use engine::{ConversationEngine, Topology};
pub use gate::{AccessGate, AccessPolicy, Principal};
