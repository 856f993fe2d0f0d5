// Converter configuration
//
// The registry data is messy enough that a fixed parser cannot cover it
// alone; the config layers three correction mechanisms on top: herb renames
// (and excipient removal), key renames, and per-license row patches applied
// before any parsing.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConvertError;

/// Corrections applied while converting a registry file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Herb name fixes. Mapping a name to `null` drops the ingredient;
    /// excipients are dropped by default.
    pub herb_remapper: IndexMap<String, Option<String>>,

    /// Formula key fixes applied after key extraction.
    pub key_remapper: IndexMap<String, String>,

    /// Row patches keyed by license id, applied in order before parsing.
    pub patch: IndexMap<String, Vec<Patch>>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        // Common excipients that are not herbs.
        let excipients = [
            "",
            "乳糖",
            "二氧化矽",
            "澱粉",
            "玉米澱粉",
            "糊精",
            "羧甲基纖維素鈉",
            "麥芽糊精",
        ];
        Self {
            herb_remapper: excipients
                .into_iter()
                .map(|name| (name.to_string(), None))
                .collect(),
            key_remapper: IndexMap::new(),
            patch: IndexMap::new(),
        }
    }
}

impl ConverterConfig {
    /// Parse a configuration from YAML text.
    ///
    /// Sections present in the file replace the built-in defaults wholesale.
    pub fn from_yaml(text: &str) -> Result<Self, ConvertError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Fix an extracted formula key.
    pub fn remap_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.key_remapper.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Fix an extracted herb name; `None` drops the ingredient.
    pub fn remap_herb<'a>(&'a self, herb: &'a str) -> Option<&'a str> {
        match self.herb_remapper.get(herb) {
            Some(Some(mapped)) => Some(mapped),
            Some(None) => None,
            None => Some(herb),
        }
    }
}

/// One row correction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Patch {
    /// Replace literal text in a field.
    Replace {
        /// Column name to edit.
        field: String,
        /// Text to find.
        pattern: String,
        /// Replacement text.
        repl: String,
        /// Maximum replacements; absent means all.
        #[serde(default)]
        count: Option<usize>,
    },

    /// Replace by regular expression in a field (multi-line mode).
    ReplaceRe {
        /// Column name to edit.
        field: String,
        /// Pattern to find.
        pattern: String,
        /// Replacement text; supports capture references.
        repl: String,
        /// Maximum replacements; `0` means all.
        #[serde(default)]
        count: usize,
    },

    /// Override the extracted formula key for this license.
    SetKey {
        /// The key to use.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_drops_excipients() {
        let config = ConverterConfig::default();
        assert_eq!(config.remap_herb("澱粉"), None);
        assert_eq!(config.remap_herb("乳糖"), None);
        assert_eq!(config.remap_herb(""), None);
        assert_eq!(config.remap_herb("桂枝"), Some("桂枝"));
    }

    #[test]
    fn test_config_section_replaces_defaults() {
        let config = ConverterConfig::from_yaml(
            r#"
herb_remapper:
  澱粉: null
  大黃末: 大黃
"#,
        )
        .unwrap();
        assert_eq!(config.remap_herb("澱粉"), None);
        assert_eq!(config.remap_herb("大黃末"), Some("大黃"));
        // 乳糖 was only in the default table, which the file replaced.
        assert_eq!(config.remap_herb("乳糖"), Some("乳糖"));
    }

    #[test]
    fn test_patch_deserialization() {
        let config = ConverterConfig::from_yaml(
            r#"
patch:
  衛部藥製字第000000號:
    - action: replace
      field: 處方成分
      pattern: 芍藥
      repl: 白芍
    - action: replace_re
      field: 處方成分
      pattern: '\s+$'
      repl: ''
    - action: set_key
      value: 桂枝湯
"#,
        )
        .unwrap();
        let patches = &config.patch["衛部藥製字第000000號"];
        assert_eq!(patches.len(), 3);
        assert!(matches!(patches[0], Patch::Replace { .. }));
        assert!(matches!(patches[1], Patch::ReplaceRe { .. }));
        assert!(matches!(patches[2], Patch::SetKey { .. }));
    }

    #[test]
    fn test_key_remapper() {
        let config = ConverterConfig::from_yaml(
            r#"
key_remapper:
  加味逍遙散料: 加味逍遙散
"#,
        )
        .unwrap();
        assert_eq!(config.remap_key("加味逍遙散料"), "加味逍遙散");
        assert_eq!(config.remap_key("桂枝湯"), "桂枝湯");
    }
}
