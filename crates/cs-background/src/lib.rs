//! CleanStream Background Coordinator
//!
//! Owns the persisted configuration, keeps the host's dynamic rule set in
//! step with it, counts blocked requests and answers the control panel.
//!
//! # Modules
//!
//! - `settings`: storage key and rule id layout
//! - `store`: key/value store seam and the configuration record accessor
//! - `engine`: filter engine seam and the remove-then-add adapter
//! - `counter`: per-session hit counters
//! - `protocol`: control-plane requests and responses
//! - `coordinator`: command handlers and lifecycle hooks
//! - `actor`: single-queue driver serializing every mutation

pub mod actor;
pub mod coordinator;
pub mod counter;
pub mod engine;
pub mod protocol;
pub mod settings;
pub mod store;

pub use actor::{spawn_coordinator, ActorError, ControlHandle};
pub use coordinator::{ControlError, Coordinator, TOGGLE_ENABLED_SHORTCUT};
pub use counter::HitCounter;
pub use engine::{EngineAdapter, EngineError, FilterEngine, MemoryEngine};
pub use protocol::{Request, Response};
pub use settings::BackgroundSettings;
pub use store::{ConfigStore, FileStore, KeyValueStore, MemoryStore, StoreError};
