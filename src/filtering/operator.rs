//! Filter operators and their arity classes.

use std::fmt;
use std::str::FromStr;

/// How many parameters an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `empty`, `not-empty`
    Zero,
    /// Comparisons and pattern matches
    One,
    /// Ranges
    Two,
    /// Set membership, one or more values
    Unlimited,
}

impl Arity {
    /// Whether `count` parameters satisfy this arity class
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Zero => count == 0,
            Self::One => count == 1,
            Self::Two => count == 2,
            Self::Unlimited => count >= 1,
        }
    }

    /// Human readable parameter count, used in validation messages
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Zero => "no parameters",
            Self::One => "exactly one parameter",
            Self::Two => "exactly two parameters",
            Self::Unlimited => "at least one parameter",
        }
    }
}

/// Comparison operators accepted in filter tokens (`contains:foo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Field is null or holds the empty value
    Empty,
    /// Field is neither null nor the empty value
    NotEmpty,
    /// Equality (=)
    Eq,
    /// Not equal (!=); null counts as not equal
    Ne,
    /// Less than (<)
    Lt,
    /// Greater than (>)
    Gt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than or equal (>=)
    Gte,
    /// Prefix match
    StartsWith,
    /// Suffix match
    EndsWith,
    /// Substring match
    Contains,
    /// Negated prefix match; null counts as a match
    NotStartsWith,
    /// Negated suffix match; null counts as a match
    NotEndsWith,
    /// Negated substring match; null counts as a match
    NotContains,
    /// Inclusive range
    Between,
    /// Outside the inclusive range; null counts as a match
    NotBetween,
    /// Set membership
    In,
    /// Negated set membership
    NotIn,
}

impl FilterOperator {
    /// Every known operator, grouped by arity
    pub const ALL: [Self; 18] = [
        Self::Empty,
        Self::NotEmpty,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Gt,
        Self::Lte,
        Self::Gte,
        Self::StartsWith,
        Self::EndsWith,
        Self::Contains,
        Self::NotStartsWith,
        Self::NotEndsWith,
        Self::NotContains,
        Self::Between,
        Self::NotBetween,
        Self::In,
        Self::NotIn,
    ];

    /// Name used in the query string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::NotEmpty => "not-empty",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Gte => "gte",
            Self::StartsWith => "starts-with",
            Self::EndsWith => "ends-with",
            Self::Contains => "contains",
            Self::NotStartsWith => "not-starts-with",
            Self::NotEndsWith => "not-ends-with",
            Self::NotContains => "not-contains",
            Self::Between => "between",
            Self::NotBetween => "not-between",
            Self::In => "in",
            Self::NotIn => "not-in",
        }
    }

    #[must_use]
    pub const fn arity(self) -> Arity {
        match self {
            Self::Empty | Self::NotEmpty => Arity::Zero,
            Self::Between | Self::NotBetween => Arity::Two,
            Self::In | Self::NotIn => Arity::Unlimited,
            _ => Arity::One,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token prefix is not a known operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperator(pub String);

impl fmt::Display for UnknownOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown filter operator '{}'", self.0)
    }
}

impl std::error::Error for UnknownOperator {}

impl FromStr for FilterOperator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in FilterOperator::ALL {
            assert_eq!(op.as_str().parse::<FilterOperator>(), Ok(op));
        }
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            "jumps".parse::<FilterOperator>(),
            Err(UnknownOperator("jumps".to_string()))
        );
        // Operator names are case sensitive
        assert!("EQ".parse::<FilterOperator>().is_err());
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(FilterOperator::Empty.arity(), Arity::Zero);
        assert_eq!(FilterOperator::NotContains.arity(), Arity::One);
        assert_eq!(FilterOperator::Gte.arity(), Arity::One);
        assert_eq!(FilterOperator::NotBetween.arity(), Arity::Two);
        assert_eq!(FilterOperator::NotIn.arity(), Arity::Unlimited);
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Zero.accepts(0));
        assert!(!Arity::Zero.accepts(1));
        assert!(Arity::Two.accepts(2));
        assert!(!Arity::Two.accepts(1));
        assert!(Arity::Unlimited.accepts(5));
        assert!(!Arity::Unlimited.accepts(0));
    }
}
