//! Template list + allowlist + enabled flag -> rule set
//!
//! Rule identity depends only on the template index, never on the allowlist,
//! so the engine adapter can always replace the same fixed id range.

use std::ops::Range;

use cs_core::host::normalize_allowlist;
use cs_core::types::{DomainType, Rule, RuleAction, RuleTemplate};

use crate::templates::{builtin_templates, check_template, TemplateError};

/// First dynamic rule id owned by the filter.
pub const DEFAULT_BASE_OFFSET: u32 = 1000;
pub const DEFAULT_PRIORITY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub base_offset: u32,
    pub priority: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            base_offset: DEFAULT_BASE_OFFSET,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Compile the rule set.
///
/// Disabled filtering compiles to nothing. Otherwise every template becomes
/// one third-party block rule with id `base_offset + index`, excluding the
/// normalized, deduplicated allowlist as initiator domains.
pub fn compile_rules<S: AsRef<str>>(
    templates: &[RuleTemplate],
    allowlist: &[S],
    enabled: bool,
    options: CompileOptions,
) -> Vec<Rule> {
    if !enabled {
        return Vec::new();
    }

    let excluded = normalize_allowlist(allowlist);

    // Ids never wrap; templates past the end of the id space are dropped
    templates
        .iter()
        .enumerate()
        .map_while(|(i, template)| {
            let id = u32::try_from(i).ok().and_then(|i| options.base_offset.checked_add(i))?;
            Some((id, template))
        })
        .map(|(id, template)| Rule {
            id,
            priority: options.priority,
            action: RuleAction::Block,
            pattern: template.pattern.clone(),
            resource_types: template.resource_types,
            domain_type: DomainType::ThirdParty,
            excluded_domains: excluded.clone(),
        })
        .collect()
}

/// The fixed template list and id layout, built once at startup and passed
/// to everything that compiles or applies rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    templates: Vec<RuleTemplate>,
    options: CompileOptions,
}

impl TemplateSet {
    /// Validate and wrap a template list.
    pub fn new(templates: Vec<RuleTemplate>, options: CompileOptions) -> Result<Self, TemplateError> {
        if templates.is_empty() {
            return Err(TemplateError::EmptyList);
        }
        for (i, template) in templates.iter().enumerate() {
            check_template(template, i + 1)?;
        }
        let fits = u32::try_from(templates.len())
            .ok()
            .and_then(|count| options.base_offset.checked_add(count))
            .is_some();
        if !fits {
            return Err(TemplateError::IdRangeOverflow {
                base_offset: options.base_offset,
                count: templates.len(),
            });
        }
        Ok(Self { templates, options })
    }

    pub fn builtin() -> Self {
        Self {
            templates: builtin_templates(),
            options: CompileOptions::default(),
        }
    }

    pub fn templates(&self) -> &[RuleTemplate] {
        &self.templates
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Every rule id this set can produce. Removed in full on each apply.
    pub fn owned_ids(&self) -> Range<u32> {
        // Range fits in u32, checked by `new`
        let start = self.options.base_offset;
        let count = u32::try_from(self.templates.len()).unwrap_or(u32::MAX);
        start..start.saturating_add(count)
    }

    pub fn compile<S: AsRef<str>>(&self, allowlist: &[S], enabled: bool) -> Vec<Rule> {
        compile_rules(&self.templates, allowlist, enabled, self.options)
    }
}

#[cfg(test)]
mod tests {
    use cs_core::types::ResourceType;

    use super::*;

    fn two_templates() -> Vec<RuleTemplate> {
        vec![
            RuleTemplate::new("doubleclick.net", ResourceType::SCRIPT),
            RuleTemplate::new(".criteo.com", ResourceType::IMAGE | ResourceType::SCRIPT),
        ]
    }

    const NONE: &[&str] = &[];

    #[test]
    fn disabled_compiles_to_nothing() {
        let templates = builtin_templates();
        let allowlists: [&[&str]; 3] = [NONE, &["a.com"], &["a.com", "b.org", "HTTPS://C.net/x"]];
        for allowlist in allowlists {
            assert!(compile_rules(&templates, allowlist, false, CompileOptions::default()).is_empty());
        }
    }

    #[test]
    fn empty_allowlist_has_no_exclusions() {
        let rules = compile_rules(&two_templates(), NONE, true, CompileOptions::default());
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, 1000);
        assert_eq!(rules[1].id, 1001);
        assert!(rules.iter().all(|r| r.excluded_domains.is_empty()));
        assert!(rules.iter().all(|r| r.domain_type == DomainType::ThirdParty));
        assert!(rules.iter().all(|r| r.action == RuleAction::Block));
    }

    #[test]
    fn allowlist_becomes_exclusions_on_every_rule() {
        let rules = compile_rules(&two_templates(), &["ads.example"], true, CompileOptions::default());
        assert_eq!(rules.len(), 2);
        for rule in &rules {
            assert_eq!(rule.excluded_domains, vec!["ads.example".to_string()]);
        }
    }

    #[test]
    fn rule_identity_is_allowlist_invariant() {
        let templates = builtin_templates();
        let small = compile_rules(&templates, &["a.com"], true, CompileOptions::default());
        let large = compile_rules(&templates, &["a.com", "b.com", "c.org"], true, CompileOptions::default());

        assert_eq!(small.len(), large.len());
        for rule in &small {
            let twin = large.iter().find(|r| r.id == rule.id).expect("id should survive");
            assert_eq!(twin.pattern, rule.pattern);
            assert_eq!(twin.resource_types, rule.resource_types);
            assert_eq!(twin.priority, rule.priority);
        }
    }

    #[test]
    fn duplicate_and_mixed_case_entries_compile_the_same() {
        let templates = two_templates();
        let messy = ["Example.com", "https://EXAMPLE.com/path", "example.com", "b.org"];
        let clean = ["example.com", "b.org"];
        assert_eq!(
            compile_rules(&templates, &messy, true, CompileOptions::default()),
            compile_rules(&templates, &clean, true, CompileOptions::default())
        );
    }

    #[test]
    fn custom_offset_and_priority() {
        let options = CompileOptions {
            base_offset: 50,
            priority: 3,
        };
        let rules = compile_rules(&two_templates(), NONE, true, options);
        assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![50, 51]);
        assert!(rules.iter().all(|r| r.priority == 3));
    }

    #[test]
    fn template_set_owns_fixed_range() {
        let set = TemplateSet::builtin();
        assert_eq!(set.owned_ids(), 1000..1010);
        let rules = set.compile(NONE, true);
        assert!(rules.iter().all(|r| set.owned_ids().contains(&r.id)));
    }

    #[test]
    fn template_set_rejects_bad_templates() {
        let bad = vec![RuleTemplate::new("ok.com", ResourceType::SCRIPT), RuleTemplate::new("", ResourceType::SCRIPT)];
        assert_eq!(
            TemplateSet::new(bad, CompileOptions::default()),
            Err(TemplateError::EmptyPattern { line: 2 })
        );
        assert_eq!(
            TemplateSet::new(Vec::new(), CompileOptions::default()),
            Err(TemplateError::EmptyList)
        );
    }

    #[test]
    fn template_set_rejects_offset_past_id_space() {
        let options = CompileOptions {
            base_offset: u32::MAX - 1,
            priority: 1,
        };
        assert_eq!(
            TemplateSet::new(two_templates(), options),
            Err(TemplateError::IdRangeOverflow {
                base_offset: u32::MAX - 1,
                count: 2,
            })
        );

        let last = CompileOptions {
            base_offset: u32::MAX - 2,
            priority: 1,
        };
        let set = TemplateSet::new(two_templates(), last).unwrap();
        assert_eq!(set.owned_ids(), u32::MAX - 2..u32::MAX);
    }

    #[test]
    fn compile_never_wraps_ids() {
        let options = CompileOptions {
            base_offset: u32::MAX,
            priority: 1,
        };
        let rules = compile_rules(&two_templates(), NONE, true, options);
        assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![u32::MAX]);
    }
}
