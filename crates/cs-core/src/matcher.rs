//! Local rule evaluation
//!
//! Mirrors how the host facility evaluates a compiled rule: case-insensitive
//! substring match on the URL, resource type filter, party filter and
//! initiator exclusions. Used by the in-memory engine and the CLI `check`
//! command; the browser never calls this.

use crate::host::{host_matches_domain, is_third_party};
use crate::types::{DomainType, RequestContext, Rule};

/// Does `rule` block the request described by `ctx`?
pub fn rule_matches(rule: &Rule, ctx: &RequestContext<'_>) -> bool {
    if !rule.resource_types.intersects(ctx.resource_type) {
        return false;
    }

    let third_party = is_third_party(ctx.site_host, ctx.req_host);
    let party_ok = match rule.domain_type {
        DomainType::ThirdParty => third_party,
        DomainType::FirstParty => !third_party,
    };
    if !party_ok {
        return false;
    }

    if rule
        .excluded_domains
        .iter()
        .any(|d| host_matches_domain(ctx.site_host, d))
    {
        return false;
    }

    contains_ignore_ascii_case(ctx.url, &rule.pattern)
}

/// First rule in `rules` that blocks the request.
pub fn first_match<'r>(rules: &'r [Rule], ctx: &RequestContext<'_>) -> Option<&'r Rule> {
    rules.iter().find(|rule| rule_matches(rule, ctx))
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    hay.windows(needle.len()).any(|w| w.eq_ignore_ascii_case(needle))
}
