use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

use super::{Container, RawPage, param};
use crate::errors::ApiError;
use crate::filtering::{FilterOperator, FilterType, SortDirection};

/// Container over an in-memory list.
///
/// Every item is serialized to JSON once, at construction, and filters and sorts are
/// evaluated on those values. The source list is shared and never mutated: each filter
/// narrows a view of indices into it.
///
/// Text matching (`starts-with`, `contains`, ...) ignores case. Comparisons are numeric
/// when both sides are numbers and textual otherwise.
#[derive(Debug, Clone)]
pub struct CollectionContainer<T> {
    items: Arc<[T]>,
    values: Arc<[Value]>,
    view: Vec<usize>,
    sorts: Vec<(String, SortDirection)>,
}

impl<T: Serialize> CollectionContainer<T> {
    /// # Errors
    ///
    /// Returns an internal error when an item cannot be serialized to JSON.
    pub fn new(items: impl Into<Arc<[T]>>) -> Result<Self, ApiError> {
        let items = items.into();
        let values = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                ApiError::internal("Collection could not be prepared", Some(e.to_string()))
            })?;

        Ok(Self {
            view: (0..items.len()).collect(),
            items,
            values: values.into(),
            sorts: Vec::new(),
        })
    }
}

impl<T> CollectionContainer<T> {
    /// Number of items matching the filters applied so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Keep only the items whose JSON form satisfies `predicate`
    pub fn retain(&mut self, predicate: impl Fn(&Value) -> bool) -> &mut Self {
        let values = &self.values;
        self.view = self
            .view
            .iter()
            .copied()
            .filter(|&index| predicate(&values[index]))
            .collect();
        self
    }

    fn sorted_view(&self) -> Vec<usize> {
        let mut view = self.view.clone();
        if self.sorts.is_empty() {
            return view;
        }

        // Stable, so items equal on every key keep their source order
        view.sort_by(|&a, &b| {
            self.sorts
                .iter()
                .map(|(field, direction)| {
                    let ordering = compare_values(
                        lookup(&self.values[a], field),
                        lookup(&self.values[b], field),
                    );
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        view
    }
}

#[async_trait]
impl<T> Container for CollectionContainer<T>
where
    T: Clone + Send + Sync,
{
    type Item = T;

    const BACKEND: &'static str = "in-memory";

    fn apply_filter(
        &mut self,
        filter: &FilterType<Self>,
        operator: FilterOperator,
        params: &[String],
    ) -> Result<&mut Self, ApiError> {
        let field = filter.field_name();
        let predicate = predicate(operator, params)?;
        Ok(self.retain(|item| predicate(lookup(item, field))))
    }

    fn set_sorting(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self, ApiError> {
        self.sorts.push((field.to_string(), direction));
        Ok(self)
    }

    async fn get_items(&mut self, limit: u64, offset: u64) -> Result<RawPage<T>, ApiError> {
        let total = self.view.len() as u64;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);

        let items: Vec<T> = self
            .sorted_view()
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|index| self.items[index].clone())
            .collect();

        tracing::debug!(total, offset, limit, fetched = items.len(), "Sliced in-memory page");

        Ok(RawPage { items, total })
    }
}

type Predicate = Box<dyn Fn(Option<&Value>) -> bool>;

fn predicate(operator: FilterOperator, params: &[String]) -> Result<Predicate, ApiError> {
    use FilterOperator as Op;

    let first = || param(params, 0, operator).map(str::to_string);
    let needle = || param(params, 0, operator).map(str::to_lowercase);

    let predicate: Predicate = match operator {
        Op::Empty => Box::new(is_empty),
        Op::NotEmpty => Box::new(|value: Option<&Value>| !is_empty(value)),

        Op::Eq => {
            let expected = first()?;
            Box::new(move |value: Option<&Value>| value.is_some_and(|v| compare(v, &expected).is_eq()))
        }
        Op::Ne => {
            let expected = first()?;
            Box::new(move |value: Option<&Value>| value.is_none_or(|v| compare(v, &expected).is_ne()))
        }
        Op::Lt => {
            let bound = first()?;
            Box::new(move |value: Option<&Value>| value.is_some_and(|v| compare(v, &bound).is_lt()))
        }
        Op::Gt => {
            let bound = first()?;
            Box::new(move |value: Option<&Value>| value.is_some_and(|v| compare(v, &bound).is_gt()))
        }
        Op::Lte => {
            let bound = first()?;
            Box::new(move |value: Option<&Value>| value.is_some_and(|v| compare(v, &bound).is_le()))
        }
        Op::Gte => {
            let bound = first()?;
            Box::new(move |value: Option<&Value>| value.is_some_and(|v| compare(v, &bound).is_ge()))
        }

        Op::StartsWith => {
            let needle = needle()?;
            Box::new(move |value: Option<&Value>| text(value).is_some_and(|t| t.starts_with(&needle)))
        }
        Op::EndsWith => {
            let needle = needle()?;
            Box::new(move |value: Option<&Value>| text(value).is_some_and(|t| t.ends_with(&needle)))
        }
        Op::Contains => {
            let needle = needle()?;
            Box::new(move |value: Option<&Value>| text(value).is_some_and(|t| t.contains(&needle)))
        }
        Op::NotStartsWith => {
            let needle = needle()?;
            Box::new(move |value: Option<&Value>| text(value).is_none_or(|t| !t.starts_with(&needle)))
        }
        Op::NotEndsWith => {
            let needle = needle()?;
            Box::new(move |value: Option<&Value>| text(value).is_none_or(|t| !t.ends_with(&needle)))
        }
        Op::NotContains => {
            let needle = needle()?;
            Box::new(move |value: Option<&Value>| text(value).is_none_or(|t| !t.contains(&needle)))
        }

        Op::Between => {
            let low = first()?;
            let high = param(params, 1, operator)?.to_string();
            Box::new(move |value: Option<&Value>| {
                value.is_some_and(|v| compare(v, &low).is_ge() && compare(v, &high).is_le())
            })
        }
        Op::NotBetween => {
            let low = first()?;
            let high = param(params, 1, operator)?.to_string();
            Box::new(move |value: Option<&Value>| {
                value.is_none_or(|v| compare(v, &low).is_lt() || compare(v, &high).is_gt())
            })
        }

        Op::In => {
            first()?;
            let accepted = params.to_vec();
            Box::new(move |value: Option<&Value>| {
                value.is_some_and(|v| accepted.iter().any(|p| compare(v, p).is_eq()))
            })
        }
        Op::NotIn => {
            first()?;
            let rejected = params.to_vec();
            Box::new(move |value: Option<&Value>| {
                value.is_some_and(|v| rejected.iter().all(|p| compare(v, p).is_ne()))
            })
        }
    };

    Ok(predicate)
}

/// Value at `field`, following `.` into nested objects. JSON `null` counts as absent.
fn lookup<'a>(item: &'a Value, field: &str) -> Option<&'a Value> {
    field
        .split('.')
        .try_fold(item, |current, key| current.get(key))
        .filter(|value| !value.is_null())
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty() || s == "0",
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

/// Lowercased text form of a scalar value
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Compare a stored value with a query parameter
fn compare(value: &Value, param: &str) -> Ordering {
    match value {
        Value::Number(n) => match (n.as_f64(), param.parse::<f64>()) {
            (Some(left), Ok(right)) => left.total_cmp(&right),
            _ => n.to_string().as_str().cmp(param),
        },
        Value::Bool(b) => match param {
            "true" | "1" => b.cmp(&true),
            "false" | "0" => b.cmp(&false),
            _ => b.to_string().as_str().cmp(param),
        },
        Value::String(s) => s.as_str().cmp(param),
        Value::Null | Value::Array(_) | Value::Object(_) => value.to_string().as_str().cmp(param),
    }
}

/// Ordering between two stored values; absent values sort first
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => x.to_string().cmp(&y.to_string()),
        },
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
