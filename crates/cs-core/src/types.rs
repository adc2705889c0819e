//! Core type definitions for CleanStream
//!
//! These types describe block rules in the shape the host's declarative
//! network-filtering facility understands, plus the request context used to
//! evaluate them locally.

// =============================================================================
// Rule Actions
// =============================================================================

/// Action to take for a matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleAction {
    /// Block rule - cancels the request
    #[default]
    Block,
}

impl RuleAction {
    /// Name used by the host facility.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
        }
    }
}

// =============================================================================
// Domain Type
// =============================================================================

/// Which requests a rule applies to, relative to the initiating page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DomainType {
    /// Request and initiator are on the same site
    FirstParty,
    /// Request goes to a different site than the initiator
    #[default]
    ThirdParty,
}

impl DomainType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstParty => "firstParty",
            Self::ThirdParty => "thirdParty",
        }
    }
}

// =============================================================================
// Resource Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Resource type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u32 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;   // iframe/frame
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const OTHER = 1 << 12;
    }
}

/// Host facility names, in bit order.
const RESOURCE_TYPE_NAMES: &[(ResourceType, &str)] = &[
    (ResourceType::MAIN_FRAME, "main_frame"),
    (ResourceType::SUB_FRAME, "sub_frame"),
    (ResourceType::STYLESHEET, "stylesheet"),
    (ResourceType::SCRIPT, "script"),
    (ResourceType::IMAGE, "image"),
    (ResourceType::FONT, "font"),
    (ResourceType::OBJECT, "object"),
    (ResourceType::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceType::PING, "ping"),
    (ResourceType::CSP_REPORT, "csp_report"),
    (ResourceType::MEDIA, "media"),
    (ResourceType::WEBSOCKET, "websocket"),
    (ResourceType::OTHER, "other"),
];

impl ResourceType {
    /// Parse a single resource type name. Accepts the host facility's names
    /// and the common filter-list aliases.
    pub fn from_dnr_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let ty = match name.as_str() {
            "main_frame" | "document" => Self::MAIN_FRAME,
            "sub_frame" | "subdocument" => Self::SUB_FRAME,
            "stylesheet" | "css" => Self::STYLESHEET,
            "script" | "js" => Self::SCRIPT,
            "image" | "img" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "ping" | "beacon" => Self::PING,
            "csp_report" => Self::CSP_REPORT,
            "media" => Self::MEDIA,
            "websocket" | "ws" => Self::WEBSOCKET,
            "other" => Self::OTHER,
            _ => return None,
        };
        Some(ty)
    }

    /// Host facility names for every bit set, in a stable order.
    pub fn names(self) -> Vec<&'static str> {
        RESOURCE_TYPE_NAMES
            .iter()
            .filter(|(ty, _)| self.contains(*ty))
            .map(|(_, name)| *name)
            .collect()
    }
}

// =============================================================================
// Rules
// =============================================================================

/// Static pattern plus resource types describing one category of traffic to
/// block, independent of any user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleTemplate {
    /// URL substring pattern
    pub pattern: String,
    pub resource_types: ResourceType,
}

impl RuleTemplate {
    pub fn new(pattern: impl Into<String>, resource_types: ResourceType) -> Self {
        Self {
            pattern: pattern.into(),
            resource_types,
        }
    }
}

/// A compiled rule, ready to hand to the filter engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    /// Stable identifier: base offset + template index
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    /// URL substring pattern
    pub pattern: String,
    pub resource_types: ResourceType,
    pub domain_type: DomainType,
    /// Initiator domains exempted from this rule. Empty means no exclusion clause.
    pub excluded_domains: Vec<String>,
}

// =============================================================================
// Request Context
// =============================================================================

/// Context for a request being evaluated against a rule set.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    /// Full request URL
    pub url: &'a str,
    /// Request hostname (extracted from URL)
    pub req_host: &'a str,
    /// Initiating page hostname
    pub site_host: &'a str,
    pub resource_type: ResourceType,
}
