//! Background command handlers
//!
//! The coordinator is the explicit context built once at startup: template
//! set, id layout, store and session counters all live here. Handlers take
//! `&mut self`, so whoever owns the coordinator runs them one at a time;
//! [`crate::actor`] provides that owner.

use log::{debug, info, warn};
use serde_json::Value;

use cs_compiler::TemplateSet;
use cs_core::config::ConfigRecord;
use cs_core::host::normalize_host;

use crate::counter::HitCounter;
use crate::engine::{EngineAdapter, EngineError, FilterEngine};
use crate::protocol::{AllowlistReply, EnabledReply, ProtocolError, Request, Response, StateReply};
use crate::settings::BackgroundSettings;
use crate::store::{ConfigStore, KeyValueStore, StoreError};

/// Name of the keyboard shortcut that flips the global switch.
pub const TOGGLE_ENABLED_SHORTCUT: &str = "toggle-enabled";

/// Error from a control-plane command.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Failed to persist configuration: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to apply rules: {0}")]
    Engine(#[from] EngineError),
    #[error("Site '{0}' is not a valid domain")]
    InvalidSite(String),
}

impl ControlError {
    /// Stable code carried in the `error` field of the response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Protocol(e) => e.code(),
            Self::Store(_) => "storage-failed",
            Self::Engine(_) => "apply-failed",
            Self::InvalidSite(_) => "invalid-site",
        }
    }

    fn into_response(self) -> Response {
        match &self {
            Self::Protocol(ProtocolError::UnknownCommand(_)) => Response::error(self.code()),
            _ => Response::error_with_detail(self.code(), self.to_string()),
        }
    }
}

/// Owns the background state and answers control-plane requests.
pub struct Coordinator<K, E> {
    store: ConfigStore<K>,
    adapter: EngineAdapter<E>,
    counter: HitCounter,
}

impl<K: KeyValueStore, E: FilterEngine> Coordinator<K, E> {
    pub fn new(settings: &BackgroundSettings, templates: TemplateSet, store: K, engine: E) -> Self {
        Self {
            store: ConfigStore::new(store, settings.storage_key.clone()),
            adapter: EngineAdapter::new(engine, templates),
            counter: HitCounter::new(),
        }
    }

    pub fn store(&self) -> &K {
        self.store.backend()
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    pub fn counter(&self) -> &HitCounter {
        &self.counter
    }

    pub fn templates(&self) -> &TemplateSet {
        self.adapter.templates()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// First install: seed defaults and activate the rule set.
    pub async fn on_installed(&mut self) -> Result<(), ControlError> {
        let record = ConfigRecord::default();
        self.store.write(&record).await?;
        self.apply(&record).await?;
        info!("Installed with defaults ({} templates)", self.templates().len());
        Ok(())
    }

    /// Browser startup: bring active rules back in line with the stored intent.
    pub async fn on_startup(&mut self) -> Result<(), ControlError> {
        let record = self.store.read().await;
        self.apply(&record).await?;
        info!(
            "Started: enabled={}, {} allowlisted sites",
            record.enabled,
            record.allowlist.len()
        );
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// A rule matched a request. Bumps the session counter and the persisted
    /// total.
    pub async fn rule_matched(&mut self, session_id: Option<i64>) -> Result<(), StoreError> {
        self.counter.record(session_id);
        let mut record = self.store.read().await;
        record.record_hit();
        self.store.write(&record).await
    }

    /// Keyboard shortcut. Returns None for shortcuts this coordinator does
    /// not own.
    pub async fn on_shortcut(&mut self, name: &str) -> Option<Response> {
        if name != TOGGLE_ENABLED_SHORTCUT {
            return None;
        }
        let current = self.store.read().await.enabled;
        Some(self.handle(Request::ToggleEnabled { enabled: !current }).await)
    }

    // =========================================================================
    // Control Plane
    // =========================================================================

    /// Answer a raw message.
    pub async fn dispatch(&mut self, msg: &Value) -> Response {
        match Request::parse(msg) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!("Rejected message: {}", e);
                ControlError::from(e).into_response()
            }
        }
    }

    /// Answer a parsed request.
    pub async fn handle(&mut self, request: Request) -> Response {
        let name = request.name();
        let result = match request {
            Request::GetState { session_id, site } => Ok(self.get_state(session_id, site.as_deref()).await),
            Request::ToggleEnabled { enabled } => self.toggle_enabled(enabled).await,
            Request::ToggleSite { site, block } => self.toggle_site(site.as_deref().unwrap_or(""), block).await,
            Request::ResetCounts => self.reset_counts().await,
        };

        match result {
            Ok(response) => {
                debug!("{} -> {:?}", name, response);
                response
            }
            Err(e) => {
                warn!("{} failed: {}", name, e);
                e.into_response()
            }
        }
    }

    async fn get_state(&self, session_id: Option<i64>, site: Option<&str>) -> Response {
        let record = self.store.read().await;
        Response::State(StateReply {
            enabled: record.enabled,
            site_blocked: record.is_site_blocked(site.unwrap_or("")),
            session_blocked: self.counter.get(session_id),
            total_blocked: record.counts.total,
        })
    }

    async fn toggle_enabled(&mut self, enabled: bool) -> Result<Response, ControlError> {
        let mut record = self.store.read().await;
        record.enabled = enabled;
        self.store.write(&record).await?;
        self.apply(&record).await?;
        Ok(Response::Enabled(EnabledReply { ok: true, enabled }))
    }

    async fn toggle_site(&mut self, site: &str, block: bool) -> Result<Response, ControlError> {
        let mut record = self.store.read().await;
        if !record.set_site_blocked(site, block) {
            return Err(ControlError::InvalidSite(site.to_string()));
        }
        self.store.write(&record).await?;
        self.apply(&record).await?;
        debug!(
            "Site {} {}",
            normalize_host(site),
            if block { "blocked" } else { "allowlisted" }
        );
        Ok(Response::Allowlist(AllowlistReply {
            ok: true,
            allowlist: record.allowlist,
        }))
    }

    async fn reset_counts(&mut self) -> Result<Response, ControlError> {
        let mut record = self.store.read().await;
        record.reset_counts();
        self.store.write(&record).await?;
        self.counter.clear();
        Ok(Response::ack())
    }

    async fn apply(&self, record: &ConfigRecord) -> Result<(), EngineError> {
        self.adapter.sync(&record.allowlist, record.enabled).await
    }
}
