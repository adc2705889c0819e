//! CleanStream Core Library
//!
//! Shared building blocks for the CleanStream content filter: rule and
//! resource types, host normalization, the persisted configuration record,
//! and the per-page ad-skip state machine.
//!
//! # Modules
//!
//! - `types`: rule, template and resource type definitions
//! - `host`: host normalization and same-site checks
//! - `config`: the persisted configuration record
//! - `matcher`: local evaluation of compiled rules
//! - `settings`: ad-skip agent settings
//! - `agent`: ad-skip state machine, edge detector and two-phase watcher

pub mod agent;
pub mod config;
pub mod host;
pub mod matcher;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use agent::{AdSkipAgent, Edge, EdgeDetector, Phase, PlayerSurface, Scheduler, Tick, Transition, VideoElement};
pub use config::{ConfigRecord, Counts};
pub use host::{normalize_allowlist, normalize_host};
pub use settings::AgentSettings;
pub use types::{DomainType, RequestContext, ResourceType, Rule, RuleAction, RuleTemplate};
