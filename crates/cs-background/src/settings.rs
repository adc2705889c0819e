use serde::{Deserialize, Serialize};

use cs_compiler::compiler::{CompileOptions, DEFAULT_BASE_OFFSET, DEFAULT_PRIORITY};

/// Storage key holding the configuration record.
pub const DEFAULT_STORAGE_KEY: &str = "cleanstream_state";

/// Host limit on dynamic rules.
pub const DEFAULT_MAX_RULES: usize = 5000;

/// Background coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackgroundSettings {
    pub storage_key: String,
    /// First dynamic rule id owned by the filter
    pub base_offset: u32,
    pub priority: u32,
    pub max_rules: usize,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            base_offset: DEFAULT_BASE_OFFSET,
            priority: DEFAULT_PRIORITY,
            max_rules: DEFAULT_MAX_RULES,
        }
    }
}

impl BackgroundSettings {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            base_offset: self.base_offset,
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = BackgroundSettings::from_json(r#"{"baseOffset": 2000}"#).unwrap();
        assert_eq!(settings.base_offset, 2000);
        assert_eq!(settings.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(settings.compile_options().priority, 1);
    }
}
