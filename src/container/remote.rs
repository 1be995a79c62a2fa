use async_trait::async_trait;

use super::{Container, RawPage};
use crate::errors::ApiError;
use crate::filtering::{FilterOperator, FilterType, SortDirection};

/// Query builder of a remote API client.
///
/// Filter operators are forwarded by name; the remote side understands the same
/// vocabulary (`eq`, `starts-with`, `in`, ...).
#[async_trait]
pub trait RemoteQuery: Send {
    type Item: Send;

    /// Add a `field operator params` condition to the remote query
    ///
    /// # Errors
    ///
    /// Returns an error when the client rejects the condition.
    fn push_filter(
        &mut self,
        field: &str,
        operator: FilterOperator,
        params: &[String],
    ) -> Result<(), ApiError>;

    fn push_order(&mut self, field: &str, direction: SortDirection);

    /// Run the query for one page and return it with the total number of matches
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Backend`] when the remote call fails.
    async fn fetch_with_total(
        &mut self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Self::Item>, u64), ApiError>;
}

/// Container forwarding filters, sorts and paging to a [`RemoteQuery`]
#[derive(Debug)]
pub struct RemoteContainer<Q> {
    query: Q,
}

impl<Q: RemoteQuery> RemoteContainer<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn into_inner(self) -> Q {
        self.query
    }
}

#[async_trait]
impl<Q: RemoteQuery> Container for RemoteContainer<Q> {
    type Item = Q::Item;

    const BACKEND: &'static str = "remote";

    fn apply_filter(
        &mut self,
        filter: &FilterType<Self>,
        operator: FilterOperator,
        params: &[String],
    ) -> Result<&mut Self, ApiError> {
        match operator {
            FilterOperator::Empty
            | FilterOperator::NotEmpty
            | FilterOperator::Between
            | FilterOperator::NotBetween => {
                return Err(ApiError::unsupported_operator(operator.as_str(), Self::BACKEND));
            }
            _ => {}
        }

        self.query
            .push_filter(filter.field_name(), operator, params)?;
        Ok(self)
    }

    fn set_sorting(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self, ApiError> {
        self.query.push_order(field, direction);
        Ok(self)
    }

    async fn get_items(&mut self, limit: u64, offset: u64) -> Result<RawPage<Q::Item>, ApiError> {
        let (items, total) = self.query.fetch_with_total(limit, offset).await?;
        tracing::debug!(total, offset, limit, fetched = items.len(), "Fetched remote page");
        Ok(RawPage { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingQuery {
        filters: Vec<(String, FilterOperator, Vec<String>)>,
        orders: Vec<(String, SortDirection)>,
        fetched: Option<(u64, u64)>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteQuery for RecordingQuery {
        type Item = String;

        fn push_filter(
            &mut self,
            field: &str,
            operator: FilterOperator,
            params: &[String],
        ) -> Result<(), ApiError> {
            self.filters
                .push((field.to_string(), operator, params.to_vec()));
            Ok(())
        }

        fn push_order(&mut self, field: &str, direction: SortDirection) {
            self.orders.push((field.to_string(), direction));
        }

        async fn fetch_with_total(
            &mut self,
            limit: u64,
            offset: u64,
        ) -> Result<(Vec<String>, u64), ApiError> {
            if self.fail {
                return Err(ApiError::backend("connection reset"));
            }
            self.fetched = Some((limit, offset));
            Ok((vec!["a".to_string(), "b".to_string()], 42))
        }
    }

    #[tokio::test]
    async fn test_forwards_filters_orders_and_paging() {
        let mut container = RemoteContainer::new(RecordingQuery::default());
        let filter = FilterType::new("name").field("display_name");

        container
            .apply_filter(&filter, FilterOperator::StartsWith, &["Jo".to_string()])
            .unwrap();
        container
            .apply_filter(&filter, FilterOperator::In, &["a".to_string(), "b".to_string()])
            .unwrap();
        container.set_sorting("created", SortDirection::Desc).unwrap();

        let page = container.get_items(25, 50).await.unwrap();
        assert_eq!(page.total, 42);
        assert_eq!(page.items, vec!["a", "b"]);

        let query = container.into_inner();
        assert_eq!(
            query.filters,
            vec![
                ("display_name".to_string(), FilterOperator::StartsWith, vec!["Jo".to_string()]),
                (
                    "display_name".to_string(),
                    FilterOperator::In,
                    vec!["a".to_string(), "b".to_string()]
                ),
            ]
        );
        assert_eq!(query.orders, vec![("created".to_string(), SortDirection::Desc)]);
        assert_eq!(query.fetched, Some((25, 50)));
    }

    #[test]
    fn test_unsupported_operators_fail_fast() {
        let mut container = RemoteContainer::new(RecordingQuery::default());
        let filter = FilterType::new("scheduled");

        for op in [
            FilterOperator::Empty,
            FilterOperator::NotEmpty,
            FilterOperator::Between,
            FilterOperator::NotBetween,
        ] {
            let result = container.apply_filter(&filter, op, &[]);
            assert!(matches!(
                result,
                Err(ApiError::UnsupportedOperator { backend: "remote", .. })
            ));
        }
        assert!(container.query().filters.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let mut container = RemoteContainer::new(RecordingQuery {
            fail: true,
            ..RecordingQuery::default()
        });
        let result = container.get_items(10, 0).await;
        assert!(matches!(result, Err(ApiError::Backend { .. })));
    }
}
