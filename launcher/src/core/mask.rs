//! Secret masking for anything that reaches the log.

/// Character substituted for hidden secret characters.
pub const MASK_CHAR: char = '*';

/// Number of characters kept visible at each end of a long enough token.
const VISIBLE: usize = 4;

/// Mask a token for display.
///
/// Tokens of 8 or more characters keep their first 4 and last 4 characters.
/// Shorter tokens are masked entirely.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < VISIBLE * 2 {
        return MASK_CHAR.to_string().repeat(chars.len().max(1));
    }
    let mut masked = String::with_capacity(token.len());
    masked.extend(&chars[..VISIBLE]);
    masked.extend(std::iter::repeat_n(MASK_CHAR, chars.len() - VISIBLE * 2));
    masked.extend(&chars[chars.len() - VISIBLE..]);
    masked
}

/// Replaces known secrets in free-form text with their masked form.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret. Empty strings are ignored.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), &mask_token(secret));
            }
        }
        out
    }
}
