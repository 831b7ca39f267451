use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 16;

/// Validated asset or dataset ticker, normalized to uppercase.
///
/// Accepts crypto tickers (`ETH`, `BTC`) and dataset keys such as
/// `BOT_VOLUME`: ASCII letters, digits, and underscores, starting with
/// a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if trimmed.len() > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len: trimmed.len(),
                max: MAX_SYMBOL_LEN,
            });
        }

        let normalized = trimmed.to_ascii_uppercase();
        for (index, ch) in normalized.chars().enumerate() {
            if index == 0 {
                if !ch.is_ascii_alphabetic() {
                    return Err(ValidationError::SymbolInvalidStart { ch });
                }
            } else if !ch.is_ascii_alphanumeric() && ch != '_' {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_uppercase() {
        let symbol = Symbol::parse("eth").expect("must parse");
        assert_eq!(symbol.as_str(), "ETH");
    }

    #[test]
    fn accepts_dataset_keys_with_underscores() {
        let symbol = Symbol::parse("bot_volume").expect("must parse");
        assert_eq!(symbol.as_str(), "BOT_VOLUME");
    }

    #[test]
    fn rejects_leading_digit() {
        let err = Symbol::parse("1INCHX").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidStart { .. }));
    }

    #[test]
    fn rejects_empty() {
        let err = Symbol::parse("   ").expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptySymbol));
    }
}
