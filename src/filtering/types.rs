//! Filter and sort types: the named descriptors a collection endpoint accepts.

use sea_orm::Order;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::operator::FilterOperator;
use crate::container::Container;
use crate::errors::ApiError;

/// Custom filter application, called instead of [`Container::apply_filter`]
pub type FilterFn<C> =
    Arc<dyn Fn(&mut C, FilterOperator, &[String], &FilterType<C>) -> Result<(), ApiError> + Send + Sync>;

/// Custom sort application, called instead of [`Container::set_sorting`]
pub type SortFn<C> = Arc<dyn Fn(&mut C, SortDirection, &SortType<C>) -> Result<(), ApiError> + Send + Sync>;

/// Sort direction as written in the query string (`sort[created]=desc`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    /// Only the lowercase spellings are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("invalid sort direction '{other}'")),
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Type of the values a filter compares against.
///
/// Typed backends coerce parameters to this kind, and validation rejects parameters
/// that do not parse as it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
}

impl ValueKind {
    /// Built-in validation rule enforcing this kind, if any
    #[must_use]
    pub const fn validation_rule(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Integer => Some("integer"),
            Self::Float => Some("numeric"),
            Self::Boolean => Some("boolean"),
        }
    }
}

/// A filter a collection accepts, e.g. `filters[created]=gte:1430404502`.
///
/// ```rust,ignore
/// let created = FilterType::new("created")
///     .kind(ValueKind::Integer)
///     .operators([FilterOperator::Lt, FilterOperator::Gte, FilterOperator::Between]);
///
/// let owner = FilterType::new("owner").field("owner_id").rules("integer|min:1");
/// ```
pub struct FilterType<C> {
    name: String,
    field: Option<String>,
    operators: Option<Vec<FilterOperator>>,
    rules: Option<String>,
    kind: ValueKind,
    function: Option<FilterFn<C>>,
}

impl<C> FilterType<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: None,
            operators: None,
            rules: None,
            kind: ValueKind::default(),
            function: None,
        }
    }

    /// Name of the backing column or property, if it differs from the filter name
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Restrict the operators this filter accepts. Unset means every known operator.
    #[must_use]
    pub fn operators(mut self, operators: impl IntoIterator<Item = FilterOperator>) -> Self {
        self.operators = Some(operators.into_iter().collect());
        self
    }

    /// Extra validation rules applied to every parameter, e.g. `"integer|min:0"`
    #[must_use]
    pub fn rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Apply this filter with a custom function instead of the container's default
    #[must_use]
    pub fn apply_with<F>(mut self, function: F) -> Self
    where
        F: Fn(&mut C, FilterOperator, &[String], &FilterType<C>) -> Result<(), ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.function = Some(Arc::new(function));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing field name; defaults to the filter name
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn supported_operators(&self) -> Option<&[FilterOperator]> {
        self.operators.as_deref()
    }

    /// Whether `operator` is accepted by this filter
    #[must_use]
    pub fn supports(&self, operator: FilterOperator) -> bool {
        self.operators
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&operator))
    }

    #[must_use]
    pub fn validation_rules(&self) -> Option<&str> {
        self.rules.as_deref()
    }

    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        self.kind
    }
}

impl<C: Container> FilterType<C> {
    /// Apply one parsed token to the container
    ///
    /// # Errors
    ///
    /// Propagates errors from the custom function or the container.
    pub fn apply(
        &self,
        container: &mut C,
        operator: FilterOperator,
        params: &[String],
    ) -> Result<(), ApiError> {
        tracing::debug!(
            filter = %self.name,
            field = %self.field_name(),
            operator = %operator,
            params = ?params,
            custom = self.function.is_some(),
            "Applying filter"
        );

        match &self.function {
            Some(function) => function(container, operator, params, self),
            None => container
                .apply_filter(self, operator, params)
                .map(|_| ()),
        }
    }
}

impl<C> fmt::Debug for FilterType<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterType")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("operators", &self.operators)
            .field("rules", &self.rules)
            .field("kind", &self.kind)
            .field("custom", &self.function.is_some())
            .finish()
    }
}

/// A sort a collection accepts, e.g. `sort[created]=desc`.
pub struct SortType<C> {
    name: String,
    title: Option<String>,
    field: Option<String>,
    function: Option<SortFn<C>>,
}

impl<C> SortType<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            field: None,
            function: None,
        }
    }

    /// Display title, for documentation of the endpoint
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Apply this sort with a custom function, e.g. to order by several columns
    #[must_use]
    pub fn apply_with<F>(mut self, function: F) -> Self
    where
        F: Fn(&mut C, SortDirection, &SortType<C>) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.function = Some(Arc::new(function));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Backing field name; defaults to the sort name
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

impl<C: Container> SortType<C> {
    /// Apply this sort to the container
    ///
    /// # Errors
    ///
    /// Propagates errors from the custom function or the container.
    pub fn apply(&self, container: &mut C, direction: SortDirection) -> Result<(), ApiError> {
        tracing::debug!(
            sort = %self.name,
            field = %self.field_name(),
            direction = %direction,
            custom = self.function.is_some(),
            "Applying sort"
        );

        match &self.function {
            Some(function) => function(container, direction, self),
            None => container
                .set_sorting(self.field_name(), direction)
                .map(|_| ()),
        }
    }
}

impl<C> fmt::Debug for SortType<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortType")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("field", &self.field)
            .field("custom", &self.function.is_some())
            .finish()
    }
}
