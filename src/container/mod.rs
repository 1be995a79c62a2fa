//! Data-source containers.
//!
//! A [`Container`] wraps one data source for the duration of one request. Filters and
//! sorts accumulate on it, then exactly one page is fetched. The caller picks the
//! variant that matches its data source:
//!
//! - [`EntityContainer`]: a Sea-ORM `Select<E>`; filtering, sorting and counting run in
//!   the database
//! - [`CollectionContainer`]: an in-memory list of serializable items
//! - [`RemoteContainer`]: a query against a remote API, through [`RemoteQuery`]

use async_trait::async_trait;

use crate::errors::ApiError;
use crate::filtering::{FilterOperator, FilterType, SortDirection};

pub mod collection;
pub mod entity;
pub mod remote;

pub use collection::CollectionContainer;
pub use entity::EntityContainer;
pub use remote::{RemoteContainer, RemoteQuery};

/// One page of raw items plus the number of items matching every applied filter
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// A backend the collection can filter, sort and page through.
#[async_trait]
pub trait Container: Send + Sized {
    /// Raw item type produced by the backend
    type Item: Send;

    /// Short backend name used in logs and errors
    const BACKEND: &'static str;

    /// Add one filter predicate. Predicates from repeated calls are AND-ed.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot express the operator or a parameter
    /// cannot be converted for the backend.
    fn apply_filter(
        &mut self,
        filter: &FilterType<Self>,
        operator: FilterOperator,
        params: &[String],
    ) -> Result<&mut Self, ApiError>;

    /// Add one sort key. The first key added is the primary one.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot sort on `field`.
    fn set_sorting(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self, ApiError>;

    /// Fetch the page `[offset, offset + limit)` and the total number of matches.
    ///
    /// # Errors
    ///
    /// Propagates backend I/O failures unchanged.
    async fn get_items(&mut self, limit: u64, offset: u64) -> Result<RawPage<Self::Item>, ApiError>;
}

/// Parameter at `index`, which validation guarantees to exist for the operator's arity
pub(crate) fn param<'a>(
    params: &'a [String],
    index: usize,
    operator: FilterOperator,
) -> Result<&'a str, ApiError> {
    params.get(index).map(String::as_str).ok_or_else(|| {
        ApiError::internal(
            "Filter could not be applied",
            Some(format!(
                "operator '{operator}' expects {} but got {} parameter(s)",
                operator.arity().describe(),
                params.len()
            )),
        )
    })
}
