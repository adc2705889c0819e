use std::fs;
use std::path::Path;

use cs_background::BackgroundSettings;
use cs_compiler::{builtin_templates, parse_template_list, CompileOptions, RuleUpdate, TemplateSet};
use cs_core::host::{extract_host, normalize_host};
use cs_core::matcher::first_match;
use cs_core::types::{RequestContext, ResourceType, Rule};

pub fn read_settings(path: Option<&Path>) -> Result<BackgroundSettings, String> {
    let Some(path) = path else {
        return Ok(BackgroundSettings::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    BackgroundSettings::from_json(&text).map_err(|e| format!("Invalid settings '{}': {}", path.display(), e))
}

/// The built-in templates, or the list in `path`.
pub fn load_templates(path: Option<&Path>, options: CompileOptions) -> Result<TemplateSet, String> {
    let Some(path) = path else {
        return TemplateSet::new(builtin_templates(), options).map_err(|e| e.to_string());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let templates = parse_template_list(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
    TemplateSet::new(templates, options).map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn render_update(set: &TemplateSet, allowlist: &[String], enabled: bool, pretty: bool) -> Result<String, String> {
    let rules = set.compile(allowlist, enabled);
    let update = RuleUpdate::new(set.owned_ids(), &rules);
    let json = if pretty {
        serde_json::to_string_pretty(&update)
    } else {
        update.to_json()
    };
    json.map_err(|e| format!("Failed to render rules: {}", e))
}

/// First compiled rule that would block `url` requested from `site`.
pub fn find_blocking_rule(
    rules: &[Rule],
    url: &str,
    site: &str,
    resource_type: &str,
) -> Result<Option<u32>, String> {
    let resource_type =
        ResourceType::from_dnr_name(resource_type).ok_or_else(|| format!("Unknown resource type '{}'", resource_type))?;
    let req_host = extract_host(url).ok_or_else(|| format!("Not a URL: '{}'", url))?;
    let site_host = normalize_host(site);

    let ctx = RequestContext {
        url,
        req_host,
        site_host: &site_host,
        resource_type,
    };
    Ok(first_match(rules, &ctx).map(|rule| rule.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_builtin_update() {
        let set = load_templates(None, CompileOptions::default()).unwrap();
        let json = render_update(&set, &[], true, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["addRules"].as_array().unwrap().len(), 10);
        assert_eq!(value["removeRuleIds"][0], 1000);
    }

    #[test]
    fn honors_custom_offset() {
        let options = CompileOptions {
            base_offset: 5000,
            priority: 2,
        };
        let set = load_templates(None, options).unwrap();
        let rules = set.compile(&["a.com"], true);
        assert_eq!(rules[0].id, 5000);
        assert_eq!(rules[0].priority, 2);
    }

    #[test]
    fn finds_blocking_rule() {
        let set = TemplateSet::builtin();
        let rules = set.compile(&["news.org"], true);
        let url = "https://pagead2.googlesyndication.com/pagead/show_ads.js";

        let hit = find_blocking_rule(&rules, url, "https://www.youtube.com/watch", "script").unwrap();
        assert!(hit.is_some());
        assert_eq!(find_blocking_rule(&rules, url, "news.org", "script").unwrap(), None);
        assert!(find_blocking_rule(&rules, url, "a.com", "blob").is_err());
    }

    #[test]
    fn settings_file_moves_rule_ids() {
        let path = std::env::temp_dir().join(format!("cs-cli-settings-{}.json", std::process::id()));
        fs::write(&path, r#"{"baseOffset": 7000, "priority": 4}"#).unwrap();
        let settings = read_settings(Some(path.as_path()));
        fs::remove_file(&path).unwrap();

        let set = load_templates(None, settings.unwrap().compile_options()).unwrap();
        assert_eq!(set.owned_ids(), 7000..7010);

        let rules = set.compile::<&str>(&[], true);
        let url = "https://pagead2.googlesyndication.com/pagead/show_ads.js";
        let id = find_blocking_rule(&rules, url, "https://www.youtube.com/", "script").unwrap();
        assert!(id.is_some_and(|id| (7000..7010).contains(&id)));
    }
}
