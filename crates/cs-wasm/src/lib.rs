//! WebAssembly bindings for CleanStream
//!
//! The service worker uses the rule compilation and host helpers; the
//! content script starts the ad-skip agent with [`start_agent`].

mod console;
mod content;

use wasm_bindgen::prelude::*;

use cs_compiler::{parse_template_list, CompileOptions, RuleUpdate, TemplateSet};
use cs_core::host::normalize_host;
use cs_core::settings::AgentSettings;

pub use content::ContentAgent;

#[wasm_bindgen]
pub fn init_logging(level: &str) {
    console::init(console::parse_level(level));
}

/// The `updateDynamicRules` argument for the built-in templates.
#[wasm_bindgen]
pub fn compile_rules(allowlist: JsValue, enabled: bool) -> Result<JsValue, JsValue> {
    let allowlist = string_list(&allowlist)?;
    let update = build_update(&TemplateSet::builtin(), &allowlist, enabled);
    to_js(&update)
}

/// Same as [`compile_rules`] for a template list in `pattern$types` form.
#[wasm_bindgen]
pub fn compile_template_list(list_text: &str, allowlist: JsValue, enabled: bool) -> Result<JsValue, JsValue> {
    let templates = load_templates(list_text).map_err(|e| JsValue::from_str(&e))?;
    let allowlist = string_list(&allowlist)?;
    to_js(&build_update(&templates, &allowlist, enabled))
}

/// Rule ids owned by the built-in templates.
#[wasm_bindgen]
pub fn owned_rule_ids() -> Vec<u32> {
    TemplateSet::builtin().owned_ids().collect()
}

#[wasm_bindgen]
pub fn normalize_host_js(raw: &str) -> String {
    normalize_host(raw)
}

/// Start the ad-skip agent on this page. `settings_json` overrides the
/// default selectors and timings. Returns undefined on unsupported hosts.
#[wasm_bindgen]
pub fn start_agent(settings_json: Option<String>) -> Result<Option<ContentAgent>, JsValue> {
    let settings = match settings_json.as_deref() {
        Some(text) => serde_json::from_str::<AgentSettings>(text)
            .map_err(|e| JsValue::from_str(&format!("Invalid agent settings: {}", e)))?,
        None => AgentSettings::default(),
    };
    content::start(settings)
}

fn build_update(templates: &TemplateSet, allowlist: &[String], enabled: bool) -> RuleUpdate {
    let rules = templates.compile(allowlist, enabled);
    RuleUpdate::new(templates.owned_ids(), &rules)
}

fn load_templates(list_text: &str) -> Result<TemplateSet, String> {
    let templates = parse_template_list(list_text).map_err(|e| e.to_string())?;
    TemplateSet::new(templates, CompileOptions::default()).map_err(|e| e.to_string())
}

fn to_js(update: &RuleUpdate) -> Result<JsValue, JsValue> {
    let json = update
        .to_json()
        .map_err(|e| JsValue::from_str(&format!("Failed to render rules: {}", e)))?;
    js_sys::JSON::parse(&json)
}

fn string_list(value: &JsValue) -> Result<Vec<String>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Vec::new());
    }
    js_sys::Array::from(value)
        .iter()
        .map(|item| {
            item.as_string()
                .ok_or_else(|| JsValue::from_str("Allowlist entries must be strings"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_for_builtin_templates() {
        let update = build_update(&TemplateSet::builtin(), &["News.org".to_string()], true);
        let rules = update.add_rules.unwrap();
        assert_eq!(rules.len(), 10);
        assert_eq!(
            rules[0].condition.excluded_initiator_domains,
            Some(vec!["news.org".to_string()])
        );
        assert_eq!(update.remove_rule_ids, (1000..1010).collect::<Vec<u32>>());
    }

    #[test]
    fn disabled_update_only_removes() {
        let update = build_update(&TemplateSet::builtin(), &[], false);
        assert!(update.add_rules.is_none());
        assert_eq!(update.remove_rule_ids.len(), 10);
    }

    #[test]
    fn custom_template_list() {
        let templates = load_templates("! ads\ntracker.example$script,image\n").unwrap();
        assert_eq!(templates.len(), 1);
        assert!(load_templates("bad pattern$script").is_err());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn compile_rules_returns_update_object() {
        let allowlist = js_sys::Array::of1(&JsValue::from_str("a.com"));
        let update = compile_rules(allowlist.into(), true).unwrap();
        let remove = js_sys::Reflect::get(&update, &"removeRuleIds".into()).unwrap();
        assert_eq!(js_sys::Array::from(&remove).length(), 10);
    }
}
