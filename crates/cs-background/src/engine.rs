//! Filter engine seam and adapter
//!
//! The adapter never diffs: every apply removes the whole id range owned by
//! the template set and adds the freshly compiled rules in one update. A
//! rejected update is returned to the caller; the persisted configuration is
//! not rolled back, so intent and active rules can differ until the next
//! successful apply.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use cs_compiler::{RuleUpdate, TemplateSet};
use cs_core::host::extract_host;
use cs_core::matcher::first_match;
use cs_core::types::{RequestContext, ResourceType, Rule};

use crate::settings::DEFAULT_MAX_RULES;

/// Error reported by the filter engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Rule {id} rejected: {reason}")]
    InvalidRule { id: u32, reason: String },
    #[error("Duplicate rule id {0}")]
    DuplicateId(u32),
    #[error("Rule quota exceeded: {requested} > {limit}")]
    QuotaExceeded { limit: usize, requested: usize },
    #[error("Host rejected update: {0}")]
    Host(String),
}

/// The host's declarative network-filtering facility.
pub trait FilterEngine: Send + Sync + 'static {
    /// Remove then add, as one update. Either all of it applies or none.
    fn update_dynamic_rules(&self, update: RuleUpdate) -> impl Future<Output = Result<(), EngineError>> + Send;
}

// =============================================================================
// Adapter
// =============================================================================

/// Applies compiled rule sets to an engine over a fixed id range.
pub struct EngineAdapter<E> {
    engine: E,
    templates: TemplateSet,
}

impl<E: FilterEngine> EngineAdapter<E> {
    pub fn new(engine: E, templates: TemplateSet) -> Self {
        Self { engine, templates }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Compile for the given configuration and apply.
    pub async fn sync<S: AsRef<str>>(&self, allowlist: &[S], enabled: bool) -> Result<(), EngineError> {
        let rules = self.templates.compile(allowlist, enabled);
        self.apply(&rules).await
    }

    /// Replace the owned id range with `rules`.
    pub async fn apply(&self, rules: &[Rule]) -> Result<(), EngineError> {
        let update = RuleUpdate::new(self.templates.owned_ids(), rules);
        debug!(
            "Updating dynamic rules: remove {}, add {}",
            update.remove_rule_ids.len(),
            rules.len()
        );

        if let Err(e) = self.engine.update_dynamic_rules(update).await {
            warn!("Filter engine rejected rule update: {}", e);
            return Err(e);
        }

        info!("Applied {} block rules", rules.len());
        Ok(())
    }
}

// =============================================================================
// In-Memory Engine
// =============================================================================

#[derive(Debug)]
struct EngineState {
    rules: BTreeMap<u32, Rule>,
    max_rules: usize,
    updates: usize,
}

/// Engine that validates and records rules in memory, evaluating requests
/// the way the host would. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::with_max_rules(DEFAULT_MAX_RULES)
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rules(max_rules: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                rules: BTreeMap::new(),
                max_rules,
                updates: 0,
            })),
        }
    }

    /// Active rules in id order.
    pub fn active_rules(&self) -> Vec<Rule> {
        self.lock().rules.values().cloned().collect()
    }

    /// Successful updates so far.
    pub fn updates(&self) -> usize {
        self.lock().updates
    }

    /// Id of the active rule blocking this request, if any.
    pub fn would_block(&self, url: &str, site_host: &str, resource_type: ResourceType) -> Option<u32> {
        let req_host = extract_host(url).unwrap_or("");
        let ctx = RequestContext {
            url,
            req_host,
            site_host,
            resource_type,
        };
        let rules = self.active_rules();
        first_match(&rules, &ctx).map(|r| r.id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FilterEngine for MemoryEngine {
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();

        // Work on a copy so a rejected update leaves the active set untouched
        let mut next = state.rules.clone();
        for id in &update.remove_rule_ids {
            next.remove(id);
        }

        for dnr in update.add_rules.unwrap_or_default() {
            let rule = dnr.to_rule().map_err(|e| EngineError::InvalidRule {
                id: dnr.id,
                reason: e.to_string(),
            })?;
            if rule.pattern.is_empty() || !rule.pattern.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(EngineError::InvalidRule {
                    id: rule.id,
                    reason: format!("malformed urlFilter '{}'", rule.pattern),
                });
            }
            if rule.resource_types.is_empty() {
                return Err(EngineError::InvalidRule {
                    id: rule.id,
                    reason: "no resource types".to_string(),
                });
            }
            if next.contains_key(&rule.id) {
                return Err(EngineError::DuplicateId(rule.id));
            }
            next.insert(rule.id, rule);
        }

        if next.len() > state.max_rules {
            return Err(EngineError::QuotaExceeded {
                limit: state.max_rules,
                requested: next.len(),
            });
        }

        state.rules = next;
        state.updates += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cs_compiler::dnr::DnrRule;

    use super::*;

    const NONE: &[&str] = &[];

    fn adapter(engine: MemoryEngine) -> EngineAdapter<MemoryEngine> {
        EngineAdapter::new(engine, TemplateSet::builtin())
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let engine = MemoryEngine::new();
        let adapter = adapter(engine.clone());

        adapter.sync(&["news.org"], true).await.unwrap();
        let first = engine.active_rules();
        adapter.sync(&["news.org"], true).await.unwrap();

        assert_eq!(engine.active_rules(), first);
        assert_eq!(first.len(), 10);
        assert_eq!(engine.updates(), 2);
    }

    #[tokio::test]
    async fn disabling_clears_owned_rules() {
        let engine = MemoryEngine::new();
        let adapter = adapter(engine.clone());

        adapter.sync(NONE, true).await.unwrap();
        adapter.sync(NONE, false).await.unwrap();
        assert!(engine.active_rules().is_empty());
    }

    #[tokio::test]
    async fn allowlist_change_replaces_exclusions() {
        let engine = MemoryEngine::new();
        let adapter = adapter(engine.clone());

        adapter.sync(&["a.com"], true).await.unwrap();
        adapter.sync(NONE, true).await.unwrap();
        assert!(engine.active_rules().iter().all(|r| r.excluded_domains.is_empty()));
    }

    #[tokio::test]
    async fn rejected_update_keeps_previous_rules() {
        let engine = MemoryEngine::with_max_rules(10);
        let adapter = adapter(engine.clone());
        adapter.sync(NONE, true).await.unwrap();
        let before = engine.active_rules();

        let mut bad = DnrRule::from(&before[0]);
        bad.id = 1;
        bad.condition.url_filter = "has space".to_string();
        let update = RuleUpdate {
            remove_rule_ids: Vec::new(),
            add_rules: Some(vec![bad]),
        };
        let err = engine.update_dynamic_rules(update).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule { id: 1, .. }));
        assert_eq!(engine.active_rules(), before);
    }

    #[tokio::test]
    async fn quota_is_enforced() {
        let engine = MemoryEngine::with_max_rules(5);
        let err = adapter(engine.clone()).sync(NONE, true).await.unwrap_err();
        assert_eq!(err, EngineError::QuotaExceeded { limit: 5, requested: 10 });
        assert!(engine.active_rules().is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let engine = MemoryEngine::new();
        let rules = TemplateSet::builtin().compile(NONE, true);
        let dnr = DnrRule::from(&rules[0]);
        let update = RuleUpdate {
            remove_rule_ids: Vec::new(),
            add_rules: Some(vec![dnr.clone(), dnr]),
        };
        assert_eq!(engine.update_dynamic_rules(update).await, Err(EngineError::DuplicateId(1000)));
    }

    #[tokio::test]
    async fn blocks_third_party_but_not_allowlisted_or_first_party() {
        let engine = MemoryEngine::new();
        let adapter = adapter(engine.clone());
        adapter.sync(&["news.org"], true).await.unwrap();

        let url = "https://googleads.g.doubleclick.net/pagead/ads.js";
        assert_eq!(engine.would_block(url, "www.youtube.com", ResourceType::SCRIPT), Some(1000));
        assert_eq!(engine.would_block(url, "www.news.org", ResourceType::SCRIPT), None);
        assert_eq!(engine.would_block(url, "doubleclick.net", ResourceType::SCRIPT), None);
        assert_eq!(engine.would_block(url, "www.youtube.com", ResourceType::STYLESHEET), None);
    }
}
