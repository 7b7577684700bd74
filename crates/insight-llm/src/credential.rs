//! API credential wrapper

use std::fmt;

/// API key used to authorize provider calls
///
/// `Debug` and `Display` never print the key itself.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key; surrounding whitespace is removed
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    /// Wrap a raw key, returning `None` when it is blank
    pub fn non_empty(key: impl Into<String>) -> Option<Self> {
        let credential = Self::new(key);
        (!credential.is_empty()).then_some(credential)
    }

    /// The raw key, for the request header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short masked form for status output, e.g. `AIza…x9Q`
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("AIzaSySecretValue123");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("Secret"));
        assert_eq!(credential.expose(), "AIzaSySecretValue123");
    }

    #[test]
    fn test_trims_and_rejects_blank() {
        assert_eq!(Credential::new("  key-1 \n").expose(), "key-1");
        assert!(Credential::non_empty("   ").is_none());
        assert!(Credential::non_empty("k").is_some());
    }

    #[test]
    fn test_masked() {
        assert_eq!(Credential::new("short").masked(), "*****");
        assert_eq!(Credential::new("AIzaSyABCDEFx9Q").masked(), "AIza…x9Q");
    }
}
