//! CleanStream Rule Compiler
//!
//! This crate turns the block template list plus the user's allowlist into
//! the dynamic rule set handed to the host's network-filtering facility.

pub mod compiler;
pub mod dnr;
pub mod templates;

pub use compiler::{compile_rules, CompileOptions, TemplateSet};
pub use dnr::{DnrError, DnrRule, RuleUpdate};
pub use templates::{builtin_templates, parse_template_list, TemplateError};
