use std::fmt;

/// A GitLab access token.
///
/// `Debug` never prints the secret so tokens can travel inside configuration
/// structs that end up in log lines.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let token = Token::from("glpat-very-secret");
        assert_eq!(format!("{token:?}"), "Token(****)");
        assert_eq!(token.as_str(), "glpat-very-secret");
    }

    #[test]
    fn test_blank_token_is_empty() {
        assert!(Token::from("  ").is_empty());
        assert!(!Token::from("x").is_empty());
    }
}
