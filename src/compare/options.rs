//! Comparison options.
//!
//! One plain record drives a comparison. It deserializes from YAML; every
//! field is optional and unknown keys are rejected:
//!
//! ```yaml
//! inserted_style:
//!   highlight_color: "#00FFFF"
//!   underline: true
//! deleted_style:
//!   font_color: darkRed
//!   strikethrough: true
//! generate_summary_page: false
//! output_password: s3cret
//! output_encryption: standard
//! ```
use crate::compare::style::{StylePolicy, StyleSettings};
use crate::error::{CompareError, Result};
use crate::ooxml::crypto::EncryptionScheme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one comparison.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparisonOptions {
    pub inserted_style: StyleSettings,
    pub deleted_style: StyleSettings,
    pub changed_style: StyleSettings,
    /// Prepend a page with per-kind change counts
    pub generate_summary_page: bool,
    pub source_password: Option<String>,
    pub target_password: Option<String>,
    /// Encrypt the result with this password
    pub output_password: Option<String>,
    /// Scheme used when `output_password` is set
    pub output_encryption: EncryptionScheme,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            inserted_style: StyleSettings::default(),
            deleted_style: StyleSettings::default(),
            changed_style: StyleSettings::default(),
            generate_summary_page: true,
            source_password: None,
            target_password: None,
            output_password: None,
            output_encryption: EncryptionScheme::default(),
        }
    }
}

// Passwords are never printed.
impl std::fmt::Debug for ComparisonOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |p: &Option<String>| p.as_ref().map(|_| "***");
        f.debug_struct("ComparisonOptions")
            .field("inserted_style", &self.inserted_style)
            .field("deleted_style", &self.deleted_style)
            .field("changed_style", &self.changed_style)
            .field("generate_summary_page", &self.generate_summary_page)
            .field("source_password", &redact(&self.source_password))
            .field("target_password", &redact(&self.target_password))
            .field("output_password", &redact(&self.output_password))
            .field("output_encryption", &self.output_encryption)
            .finish()
    }
}

impl ComparisonOptions {
    /// Parse options from a YAML document and validate them.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_saphyr::from_str(yaml)
            .map_err(|e| CompareError::Configuration(format!("invalid options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| CompareError::io_at(path, e))?;
        Self::from_yaml_str(&yaml).map_err(|e| match e {
            CompareError::Configuration(msg) => {
                CompareError::Configuration(format!("{}: {msg}", path.display()))
            },
            other => other,
        })
    }

    /// Serialize to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| CompareError::Configuration(format!("cannot serialize options: {e}")))
    }

    /// Reject values that cannot be acted on.
    pub fn validate(&self) -> Result<()> {
        for (name, password) in [
            ("source_password", &self.source_password),
            ("target_password", &self.target_password),
            ("output_password", &self.output_password),
        ] {
            if password.as_deref() == Some("") {
                return Err(CompareError::Configuration(format!(
                    "{name} must not be empty; omit it instead"
                )));
            }
        }
        if self.output_password.is_some() && !cfg!(feature = "encryption") {
            return Err(CompareError::Configuration(
                "output_password needs the `encryption` feature".to_string(),
            ));
        }
        Ok(())
    }

    /// The style policy these options describe.
    pub fn policy(&self) -> StylePolicy {
        StylePolicy {
            inserted: self.inserted_style.clone(),
            deleted: self.deleted_style.clone(),
            changed: self.changed_style.clone(),
        }
    }

    pub fn with_summary_page(mut self, on: bool) -> Self {
        self.generate_summary_page = on;
        self
    }

    pub fn with_passwords(mut self, source: Option<&str>, target: Option<&str>) -> Self {
        self.source_password = source.map(str::to_string);
        self.target_password = target.map(str::to_string);
        self
    }

    /// Set only the source password, keeping any configured target password.
    pub fn with_source_password(mut self, password: &str) -> Self {
        self.source_password = Some(password.to_string());
        self
    }

    /// Set only the target password, keeping any configured source password.
    pub fn with_target_password(mut self, password: &str) -> Self {
        self.target_password = Some(password.to_string());
        self
    }

    pub fn with_output_password(mut self, password: &str, scheme: EncryptionScheme) -> Self {
        self.output_password = Some(password.to_string());
        self.output_encryption = scheme;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Color;
    use crate::compare::operation::ChangeKind;

    #[test]
    fn test_empty_yaml_is_default() {
        let options = ComparisonOptions::from_yaml_str("{}").unwrap();
        assert_eq!(options, ComparisonOptions::default());
        assert!(options.generate_summary_page);
    }

    #[test]
    fn test_yaml_styles() {
        let yaml = r##"
inserted_style:
  highlight_color: "#00FFFF"
  underline: true
deleted_style:
  font_color: darkRed
  bold: false
generate_summary_page: false
output_encryption: standard
"##;
        let options = ComparisonOptions::from_yaml_str(yaml).unwrap();
        assert!(!options.generate_summary_page);
        assert_eq!(options.output_encryption, EncryptionScheme::Standard);

        let policy = options.policy();
        let inserted = policy.resolve(ChangeKind::Inserted);
        assert_eq!(inserted.highlight, Color::from_hex("00FFFF").unwrap());
        assert_eq!(inserted.font, Color::BLUE);
        let deleted = policy.resolve(ChangeKind::Deleted);
        assert_eq!(deleted.font, Color::from_highlight_name("darkRed").unwrap());
        assert!(deleted.flags.is_empty());
    }

    #[test]
    fn test_invalid_color_is_configuration_error() {
        let err = ComparisonOptions::from_yaml_str("changed_style:\n  font_color: \"#12345G\"\n")
            .unwrap_err();
        assert!(matches!(err, CompareError::Configuration(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ComparisonOptions::from_yaml_str("summary: true\n").unwrap_err();
        assert!(matches!(err, CompareError::Configuration(_)));
    }

    #[test]
    fn test_single_password_keeps_configured_other() {
        let options = ComparisonOptions::from_yaml_str("target_password: from-config\n")
            .unwrap()
            .with_source_password("from-cli");
        assert_eq!(options.source_password.as_deref(), Some("from-cli"));
        assert_eq!(options.target_password.as_deref(), Some("from-config"));

        let options = ComparisonOptions::from_yaml_str("source_password: from-config\n")
            .unwrap()
            .with_target_password("from-cli");
        assert_eq!(options.source_password.as_deref(), Some("from-config"));
        assert_eq!(options.target_password.as_deref(), Some("from-cli"));
    }

    #[test]
    fn test_empty_password_rejected() {
        let options = ComparisonOptions::default().with_passwords(Some(""), None);
        assert!(matches!(
            options.validate(),
            Err(CompareError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let options = ComparisonOptions::default().with_passwords(Some("hunter2"), None);
        let printed = format!("{options:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.yaml");
        let options = ComparisonOptions::default()
            .with_summary_page(false)
            .with_passwords(Some("a"), Some("b"));
        std::fs::write(&path, options.to_yaml_string().unwrap()).unwrap();
        assert_eq!(ComparisonOptions::from_yaml_file(&path).unwrap(), options);

        let err = ComparisonOptions::from_yaml_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, CompareError::Io { .. }));
    }
}
