//! Filter token parsing.
//!
//! A filter token is `operator[:param[,param...]]`. A literal comma inside a parameter
//! is written `\,`. The prefix before the first colon is always taken as the operator;
//! whether it is a known one is decided during validation, so `jumps` parses fine and
//! is then rejected with a useful message.

use super::operator::{FilterOperator, UnknownOperator};

const COMMA_PLACEHOLDER: &str = "\u{0}#DELIMITER#\u{0}";

/// One parsed filter token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterItem {
    /// Operator name exactly as written in the token
    pub operator: String,
    /// Parameters in order, trimmed, with escaped commas restored
    pub params: Vec<String>,
}

impl FilterItem {
    /// Resolve the operator name against the known operators
    ///
    /// # Errors
    ///
    /// Returns [`UnknownOperator`] when the prefix is not a known operator.
    pub fn operator(&self) -> Result<FilterOperator, UnknownOperator> {
        self.operator.parse()
    }

    /// Whether the parameter count matches the operator's arity. Unknown operators
    /// never match.
    #[must_use]
    pub fn has_valid_arity(&self) -> bool {
        self.operator()
            .is_ok_and(|op| op.arity().accepts(self.params.len()))
    }
}

/// Parse a filter token such as `contains:got it\, lol` or `between:5,10`.
#[must_use]
pub fn parse_filter_item(token: &str) -> FilterItem {
    let (operator, param_string) = token.split_once(':').unwrap_or((token, ""));

    let params = if param_string.is_empty() {
        Vec::new()
    } else {
        param_string
            .replace("\\,", COMMA_PLACEHOLDER)
            .split(',')
            .map(|param| param.replace(COMMA_PLACEHOLDER, ",").trim().to_string())
            .collect()
    };

    FilterItem {
        operator: operator.to_string(),
        params,
    }
}
