use crate::base62::Base62Code;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A validated short code identifier for a shortened URL.
///
/// Generated codes are base62 text straight from the id generator. Custom
/// aliases are 3-50 characters of ASCII letters, digits, and hyphens, with
/// no hyphen at either end and no consecutive hyphens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShortCode {
    /// A system-generated short code from the id generator.
    Generated(Base62Code),
    /// A caller-provided custom alias.
    Custom(String),
}

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 50;

impl ShortCode {
    /// Creates a `ShortCode` from a value that can be converted into
    /// [`Base62Code`], such as a freshly generated id.
    pub fn generated(code: impl Into<Base62Code>) -> Self {
        Self::Generated(code.into())
    }

    /// Creates a custom-alias `ShortCode` after validating the input.
    pub fn custom(alias: impl Into<String>) -> Result<Self, ValidationError> {
        let alias = alias.into();
        Self::validate_alias(&alias)?;
        Ok(Self::Custom(alias))
    }

    /// Classifies an inbound lookup key.
    ///
    /// Pure base62 text that decodes to a 64-bit id is treated as generated;
    /// anything else must pass the custom-alias rules. Either way `as_str`
    /// is the exact key the caller supplied.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if let Ok(code) = input.parse::<Base62Code>() {
            return Ok(Self::Generated(code));
        }
        Self::custom(input)
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            ShortCode::Generated(code) => code.as_str(),
            ShortCode::Custom(alias) => alias.as_str(),
        }
    }

    fn validate_alias(alias: &str) -> Result<(), ValidationError> {
        if alias.len() < MIN_LENGTH || alias.len() > MAX_LENGTH {
            return Err(ValidationError::InvalidAlias(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                alias.len()
            )));
        }

        if !alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ValidationError::InvalidAlias(format!(
                "must contain only ASCII letters, digits, or hyphens: '{alias}'"
            )));
        }

        if alias.starts_with('-') || alias.ends_with('-') {
            return Err(ValidationError::InvalidAlias(format!(
                "must not start or end with a hyphen: '{alias}'"
            )));
        }

        if alias.contains("--") {
            return Err(ValidationError::InvalidAlias(format!(
                "must not contain consecutive hyphens: '{alias}'"
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curtail_flake::ShortId;

    #[test]
    fn valid_aliases() {
        assert!(ShortCode::custom("abc").is_ok());
        assert!(ShortCode::custom("my-custom-link").is_ok());
        assert!(ShortCode::custom("Abc-123-xyz").is_ok());
        assert!(ShortCode::custom("a".repeat(50)).is_ok());
    }

    #[test]
    fn too_short() {
        assert!(ShortCode::custom("ab").is_err());
        assert!(ShortCode::custom("").is_err());
    }

    #[test]
    fn too_long() {
        assert!(ShortCode::custom("a".repeat(51)).is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortCode::custom("abc def").is_err());
        assert!(ShortCode::custom("abc/def").is_err());
        assert!(ShortCode::custom("abc_def").is_err());
        assert!(ShortCode::custom("café-link").is_err());
    }

    #[test]
    fn hyphen_placement() {
        assert!(ShortCode::custom("-bad").is_err());
        assert!(ShortCode::custom("bad-").is_err());
        assert!(ShortCode::custom("ba--d").is_err());
    }

    #[test]
    fn parse_classifies_base62_as_generated() {
        let code = ShortCode::parse("10abcXYZ").unwrap();
        assert!(matches!(code, ShortCode::Generated(_)));
        assert_eq!(code.as_str(), "10abcXYZ");
    }

    #[test]
    fn parse_classifies_hyphenated_as_custom() {
        let code = ShortCode::parse("my-custom-link").unwrap();
        assert!(matches!(code, ShortCode::Custom(_)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ShortCode::parse("no spaces").is_err());
        assert!(ShortCode::parse("-lead").is_err());
        assert!(ShortCode::parse("").is_err());
    }

    #[test]
    fn display_custom() {
        let code = ShortCode::custom("my-code").unwrap();
        assert_eq!(code.to_string(), "my-code");
    }

    #[test]
    fn display_generated() {
        let code = ShortCode::generated(ShortId::from_u64(3844));
        assert_eq!(code.to_string(), "100");
    }

    #[test]
    fn to_url_joins_base() {
        let code = ShortCode::custom("my-code").unwrap();
        assert_eq!(code.to_url("https://ct.io/"), "https://ct.io/my-code");
        assert_eq!(code.to_url("https://ct.io"), "https://ct.io/my-code");
    }
}
