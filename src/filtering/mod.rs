//! # Filtering & Sorting
//!
//! Translates the `filters` and `sort` query parameters of a collection request into
//! operations on a [`Container`](crate::container::Container).
//!
//! ## Filter Tokens
//!
//! Each filter value is a token of the form `operator[:param[,param...]]`:
//!
//! ```rust,ignore
//! // Zero parameters
//! GET /sms?filters[scheduled]=empty
//!
//! // One parameter
//! GET /sms?filters[content]=contains:president
//!
//! // Two parameters (inclusive range)
//! GET /sms?filters[created]=between:1430404502,1430404504
//!
//! // Literal comma inside a parameter
//! GET /sms?filters[content]=contains:got it\, lol
//!
//! // Several tokens for one filter are AND-ed
//! GET /sms?filters[content][]=not-empty&filters[content][]=contains:president
//! ```
//!
//! | Arity | Operators |
//! |---|---|
//! | 0 | `empty`, `not-empty` |
//! | 1 | `eq`, `ne`, `lt`, `gt`, `lte`, `gte`, `starts-with`, `ends-with`, `contains`, `not-starts-with`, `not-ends-with`, `not-contains` |
//! | 2 | `between`, `not-between` |
//! | 1 or more | `in`, `not-in` |
//!
//! ## Sorting
//!
//! ```rust,ignore
//! GET /sms?sort[created]=desc&sort[content]=asc
//! ```
//!
//! Sort keys are applied in the order given; the first one is the primary key.

pub mod operator;
pub mod parser;
pub mod types;

pub use operator::{Arity, FilterOperator, UnknownOperator};
pub use parser::{FilterItem, parse_filter_item};
pub use types::{FilterFn, FilterType, SortDirection, SortFn, SortType, ValueKind};
