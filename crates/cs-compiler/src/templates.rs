use cs_core::types::{ResourceType, RuleTemplate};

/// Error from parsing a template list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("line {line}: empty pattern")]
    EmptyPattern { line: usize },
    #[error("line {line}: pattern '{pattern}' must be ASCII without whitespace")]
    InvalidPattern { line: usize, pattern: String },
    #[error("line {line}: no resource types")]
    NoResourceTypes { line: usize },
    #[error("line {line}: unknown resource type '{name}'")]
    UnknownResourceType { line: usize, name: String },
    #[error("template list is empty")]
    EmptyList,
    #[error("{count} rule ids starting at {base_offset} exceed the id space")]
    IdRangeOverflow { base_offset: u32, count: usize },
}

/// Resource types used by the ad-network templates.
const AD_NETWORK: ResourceType = ResourceType::XMLHTTPREQUEST
    .union(ResourceType::IMAGE)
    .union(ResourceType::MEDIA)
    .union(ResourceType::SCRIPT)
    .union(ResourceType::SUB_FRAME);

const AD_CDN: ResourceType = ResourceType::XMLHTTPREQUEST
    .union(ResourceType::IMAGE)
    .union(ResourceType::SCRIPT)
    .union(ResourceType::SUB_FRAME);

const TRACKER: ResourceType = ResourceType::XMLHTTPREQUEST
    .union(ResourceType::IMAGE)
    .union(ResourceType::SCRIPT);

/// The built-in block list. Deliberately short so sites keep working.
/// Order matters: a template's index fixes its rule id.
pub fn builtin_templates() -> Vec<RuleTemplate> {
    vec![
        // Google Ads / DoubleClick
        RuleTemplate::new("googleads.g.doubleclick.net", AD_NETWORK),
        RuleTemplate::new("doubleclick.net", AD_NETWORK),
        RuleTemplate::new("googlesyndication.com", AD_NETWORK),
        RuleTemplate::new("googleadservices.com", AD_NETWORK),
        // YouTube ad telemetry and ad endpoints
        RuleTemplate::new("youtube.com/api/stats/ads", ResourceType::XMLHTTPREQUEST),
        RuleTemplate::new("youtube.com/get_midroll_", ResourceType::XMLHTTPREQUEST),
        // Ad CDNs
        RuleTemplate::new(".adnxs.com", AD_CDN),
        RuleTemplate::new(".scorecardresearch.com", TRACKER),
        RuleTemplate::new(".rubiconproject.com", TRACKER),
        RuleTemplate::new(".criteo.com", TRACKER),
    ]
}

/// Parse a template list, one template per line: `pattern$type1,type2`.
///
/// Blank lines and lines starting with `!`, `[` or `#` are skipped.
pub fn parse_template_list(text: &str) -> Result<Vec<RuleTemplate>, TemplateError> {
    let mut templates = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }
        templates.push(parse_template_line(line, idx + 1)?);
    }

    if templates.is_empty() {
        return Err(TemplateError::EmptyList);
    }

    log::debug!("Parsed {} templates", templates.len());
    Ok(templates)
}

/// Validate a single template.
pub fn check_template(template: &RuleTemplate, line: usize) -> Result<(), TemplateError> {
    check_pattern(&template.pattern, line)?;
    if template.resource_types.is_empty() {
        return Err(TemplateError::NoResourceTypes { line });
    }
    Ok(())
}

fn parse_template_line(line: &str, line_no: usize) -> Result<RuleTemplate, TemplateError> {
    let (pattern, types) = split_rule_options(line);
    let pattern = pattern.trim();
    check_pattern(pattern, line_no)?;

    let types = types.ok_or(TemplateError::NoResourceTypes { line: line_no })?;
    let mut mask = ResourceType::empty();
    for name in types.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let ty = ResourceType::from_dnr_name(name).ok_or_else(|| TemplateError::UnknownResourceType {
            line: line_no,
            name: name.to_string(),
        })?;
        mask |= ty;
    }

    let template = RuleTemplate::new(pattern, mask);
    check_template(&template, line_no)?;
    Ok(template)
}

fn check_pattern(pattern: &str, line: usize) -> Result<(), TemplateError> {
    if pattern.is_empty() {
        return Err(TemplateError::EmptyPattern { line });
    }
    if !pattern.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(TemplateError::InvalidPattern {
            line,
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.rfind('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}
