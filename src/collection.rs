//! Collection configuration and request-scoped assembly.
//!
//! A [`CollectionConfig`] is built once per endpoint and shared behind an `Arc`. Each
//! request gets a [`MasonCollection`], which runs three phases exactly once:
//!
//! 1. validate the query parameters, rejecting the request with every violation at once
//! 2. apply filters and sorting to the container
//! 3. fetch one page and render it into a [`CollectionDocument`]
//!
//! ```rust,ignore
//! let config = Arc::new(
//!     CollectionConfig::builder()
//!         .filter(FilterType::new("content"))
//!         .filter(FilterType::new("created").kind(ValueKind::Integer))
//!         .sort(SortType::new("created"))
//!         .default_sort("created", SortDirection::Desc)
//!         .build()?,
//! );
//!
//! async fn list_sms(
//!     State(state): State<AppState>,
//!     request: CollectionRequest,
//! ) -> Result<CollectionDocument, ApiError> {
//!     let container = EntityContainer::new(sms::Entity::find(), state.db.clone());
//!     state.sms_collection.populate(request, container).await
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::document::{
    CollectionDocument, CollectionMeta, FieldsMode, ItemRenderer, PaginationControls,
    Representable, render_item,
};
use crate::errors::ApiError;
use crate::filtering::{FilterType, SortDirection, SortType, parse_filter_item};
use crate::models::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::pagination::{MAX_OFFSET, PageOffsets, PageWindow};
use crate::request::{CollectionRequest, QueryMap};
use crate::validation::{ValidationError, ValidationErrors, Validator};

/// Page size limits of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    /// Page size when the request names none
    pub default_per_page: u64,
    /// Largest accepted `limit`
    pub max_per_page: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
        }
    }
}

/// Filters, sorts and rendering of one collection endpoint
pub struct CollectionConfig<C: Container> {
    filters: Vec<FilterType<C>>,
    sorts: Vec<SortType<C>>,
    default_sort: Vec<(String, SortDirection)>,
    renderer: Option<ItemRenderer<C::Item>>,
    pagination: PaginationSettings,
}

impl<C: Container> CollectionConfig<C> {
    #[must_use]
    pub fn builder() -> CollectionConfigBuilder<C> {
        CollectionConfigBuilder::default()
    }

    #[must_use]
    pub fn filter_type(&self, name: &str) -> Option<&FilterType<C>> {
        self.filters.iter().find(|filter| filter.name() == name)
    }

    #[must_use]
    pub fn sort_type(&self, name: &str) -> Option<&SortType<C>> {
        self.sorts.iter().find(|sort| sort.name() == name)
    }

    #[must_use]
    pub fn filter_types(&self) -> &[FilterType<C>] {
        &self.filters
    }

    #[must_use]
    pub fn sort_types(&self) -> &[SortType<C>] {
        &self.sorts
    }

    #[must_use]
    pub fn default_sort(&self) -> &[(String, SortDirection)] {
        &self.default_sort
    }

    #[must_use]
    pub fn pagination(&self) -> PaginationSettings {
        self.pagination
    }
}

impl<C> CollectionConfig<C>
where
    C: Container,
    C::Item: Representable,
{
    /// Validate `request`, apply it to `container` and assemble the page
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ValidationFailed`] for invalid query parameters, or any
    /// error the container reports.
    pub async fn populate(
        self: &Arc<Self>,
        request: CollectionRequest,
        container: C,
    ) -> Result<CollectionDocument, ApiError> {
        MasonCollection::new(Arc::clone(self), request, container)
            .assemble()
            .await
    }
}

impl<C: Container> fmt::Debug for CollectionConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("filters", &self.filters)
            .field("sorts", &self.sorts)
            .field("default_sort", &self.default_sort)
            .field("renderer", &self.renderer.is_some())
            .field("pagination", &self.pagination)
            .finish()
    }
}

/// Builder for [`CollectionConfig`]
pub struct CollectionConfigBuilder<C: Container> {
    filters: Vec<FilterType<C>>,
    sorts: Vec<SortType<C>>,
    default_sort: Vec<(String, SortDirection)>,
    renderer: Option<ItemRenderer<C::Item>>,
    pagination: PaginationSettings,
}

impl<C: Container> Default for CollectionConfigBuilder<C> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sorts: Vec::new(),
            default_sort: Vec::new(),
            renderer: None,
            pagination: PaginationSettings::default(),
        }
    }
}

impl<C: Container> CollectionConfigBuilder<C> {
    #[must_use]
    pub fn filter(mut self, filter: FilterType<C>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = FilterType<C>>) -> Self {
        self.filters.extend(filters);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortType<C>) -> Self {
        self.sorts.push(sort);
        self
    }

    #[must_use]
    pub fn sorts(mut self, sorts: impl IntoIterator<Item = SortType<C>>) -> Self {
        self.sorts.extend(sorts);
        self
    }

    /// Sorting used when the request has no `sort` parameter. Repeated calls add
    /// secondary keys.
    #[must_use]
    pub fn default_sort(mut self, name: impl Into<String>, direction: SortDirection) -> Self {
        self.default_sort.push((name.into(), direction));
        self
    }

    /// Render every item with `renderer` instead of its own representation
    #[must_use]
    pub fn item_renderer<F>(mut self, renderer: F) -> Self
    where
        F: Fn(&C::Item) -> Value + Send + Sync + 'static,
    {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    #[must_use]
    pub fn pagination(mut self, pagination: PaginationSettings) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub fn default_per_page(mut self, default_per_page: u64) -> Self {
        self.pagination.default_per_page = default_per_page;
        self
    }

    #[must_use]
    pub fn max_per_page(mut self, max_per_page: u64) -> Self {
        self.pagination.max_per_page = max_per_page;
        self
    }

    /// # Errors
    ///
    /// Returns a configuration error for duplicate filter or sort names, a default sort
    /// naming an unknown sort type, or inconsistent page sizes.
    pub fn build(self) -> Result<CollectionConfig<C>, ApiError> {
        check_unique("filter type", self.filters.iter().map(FilterType::name))?;
        check_unique("sort type", self.sorts.iter().map(SortType::name))?;
        check_unique("default sort", self.default_sort.iter().map(|(name, _)| name.as_str()))?;

        if let Some((name, _)) = self
            .default_sort
            .iter()
            .find(|(name, _)| !self.sorts.iter().any(|sort| sort.name() == name.as_str()))
        {
            return Err(ApiError::configuration(format!(
                "default sort '{name}' is not a configured sort type"
            )));
        }

        let PaginationSettings {
            default_per_page,
            max_per_page,
        } = self.pagination;
        if max_per_page == 0 || default_per_page == 0 || default_per_page > max_per_page {
            return Err(ApiError::configuration(format!(
                "default_per_page ({default_per_page}) must be between 1 and max_per_page ({max_per_page})"
            )));
        }

        Ok(CollectionConfig {
            filters: self.filters,
            sorts: self.sorts,
            default_sort: self.default_sort,
            renderer: self.renderer,
            pagination: self.pagination,
        })
    }
}

fn check_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ApiError::configuration(format!("duplicate {kind} '{name}'")));
        }
    }
    Ok(())
}

/// The request, reduced to what the apply and fetch phases need
#[derive(Debug, Clone)]
struct ValidatedQuery {
    window: PageWindow,
    fields: FieldsMode,
    filters: QueryMap,
    sort: Vec<(String, SortDirection)>,
    meta: CollectionMeta,
}

#[derive(Debug)]
enum Phase {
    Pending,
    Validated(ValidatedQuery),
    Applied(ValidatedQuery),
    Assembled(CollectionDocument),
    /// A filter or sort failed halfway; the container is in an unknown state
    Poisoned,
}

/// One collection request: its parameters, its container and its assembly progress.
///
/// Each phase runs at most once. Calling [`MasonCollection::assemble`] again returns
/// the document assembled the first time.
pub struct MasonCollection<C: Container> {
    config: Arc<CollectionConfig<C>>,
    request: CollectionRequest,
    container: C,
    phase: Phase,
}

impl<C: Container> MasonCollection<C> {
    pub fn new(config: Arc<CollectionConfig<C>>, request: CollectionRequest, container: C) -> Self {
        Self {
            config,
            request,
            container,
            phase: Phase::Pending,
        }
    }

    #[must_use]
    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn into_container(self) -> C {
        self.container
    }

    #[must_use]
    pub fn request(&self) -> &CollectionRequest {
        &self.request
    }

    #[must_use]
    pub fn is_assembled(&self) -> bool {
        matches!(self.phase, Phase::Assembled(_))
    }

    /// Check the query parameters without touching the container
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ValidationFailed`] listing every violation. The collection
    /// stays unvalidated, so a later call validates again.
    pub fn validate(&mut self) -> Result<(), ApiError> {
        match self.phase {
            Phase::Pending => {
                let query = validate_request(&self.config, &self.request)?;
                tracing::debug!(
                    limit = query.window.limit,
                    offset = query.window.offset,
                    filters = query.filters.len(),
                    sorts = query.sort.len(),
                    "Validated collection request"
                );
                self.phase = Phase::Validated(query);
                Ok(())
            }
            Phase::Poisoned => Err(poisoned()),
            Phase::Validated(_) | Phase::Applied(_) | Phase::Assembled(_) => Ok(()),
        }
    }

    /// Validate if needed, then hand every filter and sort to the container
    ///
    /// # Errors
    ///
    /// Returns validation errors, or the first error raised while applying. After an
    /// apply error the collection can no longer be assembled.
    pub fn apply(&mut self) -> Result<(), ApiError> {
        self.validate()?;

        let query = match &self.phase {
            Phase::Validated(query) => query.clone(),
            _ => return Ok(()),
        };

        if let Err(e) = apply_query(&self.config, &query, &mut self.container) {
            self.phase = Phase::Poisoned;
            return Err(e);
        }

        self.phase = Phase::Applied(query);
        Ok(())
    }
}

impl<C> MasonCollection<C>
where
    C: Container,
    C::Item: Representable,
{
    /// Run any phase not run yet and return the document
    ///
    /// # Errors
    ///
    /// Returns validation or apply errors, or the container's fetch error. A failed
    /// fetch can be retried.
    pub async fn assemble(&mut self) -> Result<CollectionDocument, ApiError> {
        self.apply()?;

        let query = match &self.phase {
            Phase::Assembled(document) => return Ok(document.clone()),
            Phase::Applied(query) => query.clone(),
            Phase::Pending | Phase::Validated(_) | Phase::Poisoned => return Err(poisoned()),
        };

        let window = query.window;
        let page = self.container.get_items(window.limit, window.offset).await?;

        let items = page
            .items
            .iter()
            .map(|item| render_item(item, query.fields, self.config.renderer.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let offsets = PageOffsets::calculate(page.total, window.limit, window.offset);
        let document = CollectionDocument {
            meta: query.meta,
            items,
            total: page.total,
            offset: window.offset,
            limit: window.limit,
            total_pages: page.total.div_ceil(window.limit),
            controls: PaginationControls::from_offsets(offsets, &self.request),
        };

        tracing::debug!(
            backend = C::BACKEND,
            total = document.total,
            returned = document.items.len(),
            "Assembled collection"
        );

        self.phase = Phase::Assembled(document.clone());
        Ok(document)
    }
}

fn poisoned() -> ApiError {
    ApiError::internal(
        "Collection could not be assembled",
        Some("a previous apply step failed".to_string()),
    )
}

fn validate_request<C: Container>(
    config: &CollectionConfig<C>,
    request: &CollectionRequest,
) -> Result<ValidatedQuery, ApiError> {
    let max = config.pagination.max_per_page;
    let validator = collection_validator(config);
    let mut errors = ValidationErrors::new();

    let page_size_rules = format!("integer|min:1|max:{max}");
    let offset_rules = format!("integer|min:0|max:{MAX_OFFSET}");
    let limit = scalar(request, &mut errors, "limit");
    let offset = scalar(request, &mut errors, "offset");
    let page = scalar(request, &mut errors, "page");
    let page_size = scalar(request, &mut errors, "page_size");
    let fields = scalar(request, &mut errors, "fields");

    for (attribute, value, rules) in [
        ("limit", limit, page_size_rules.as_str()),
        ("offset", offset, offset_rules.as_str()),
        ("page", page, offset_rules.as_str()),
        ("page_size", page_size, page_size_rules.as_str()),
        ("fields", fields, "in:all,full,brief"),
    ] {
        if let Some(value) = value {
            validator.check(&mut errors, attribute, value, rules)?;
        }
    }

    // `filter` is the older spelling; both are validated and merged
    let mut filters: QueryMap = Vec::new();
    for filter_key in ["filters", "filter"] {
        for (name, tokens) in query_map(request, &mut errors, filter_key) {
            validate_filter(config, &validator, &mut errors, filter_key, &name, &tokens)?;
            match filters.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, merged)) => merged.extend(tokens),
                None => filters.push((name, tokens)),
            }
        }
    }

    let requested_sort = query_map(request, &mut errors, "sort");
    let mut sort = Vec::with_capacity(requested_sort.len());
    for (name, directions) in &requested_sort {
        let attribute = format!("sort.{name}");
        if config.sort_type(name).is_none() {
            errors.add(ValidationError::new(
                &attribute,
                format!("The sort type '{name}' is not supported."),
            ));
            continue;
        }
        let direction = match directions.as_slice() {
            [direction] => direction.parse::<SortDirection>().ok(),
            _ => None,
        };
        match direction {
            Some(direction) => sort.push((name.clone(), direction)),
            None => errors.add(ValidationError::new(
                &attribute,
                format!("The sort direction for '{name}' must be asc or desc."),
            )),
        }
    }

    if !errors.is_empty() {
        tracing::debug!(errors = %errors, "Collection request rejected");
        return Err(errors.into());
    }

    let number = |value: Option<&str>| value.and_then(|v| v.trim().parse::<u64>().ok());
    let window = PageWindow::resolve(
        number(limit),
        number(offset),
        number(page),
        number(page_size),
        config.pagination.default_per_page,
    );

    if requested_sort.is_empty() {
        sort.clone_from(&config.default_sort);
    }

    let meta = CollectionMeta {
        sort: (!config.sorts.is_empty() && !sort.is_empty()).then(|| sort.clone()),
        filters: (!config.filters.is_empty() && !filters.is_empty()).then(|| filters.clone()),
    };

    Ok(ValidatedQuery {
        window,
        fields: fields.and_then(|f| f.parse().ok()).unwrap_or_default(),
        filters,
        sort,
        meta,
    })
}

/// Validator with the collection rules, bound to this configuration
fn collection_validator<C: Container>(config: &CollectionConfig<C>) -> Validator<'_> {
    Validator::new()
        .extend("filter_type", move |_, name, _| {
            if config.filter_type(name).is_some() {
                Ok(())
            } else {
                Err(format!("The filter type '{name}' is not supported."))
            }
        })
        .extend("filter_param_count", |_, token, _| {
            let item = parse_filter_item(token);
            if item.has_valid_arity() {
                return Ok(());
            }
            let expected = item
                .operator()
                .map(|operator| operator.arity().describe())
                .unwrap_or("a known operator");
            Err(format!(
                "The filter '{token}' expects {expected}, got {}.",
                item.params.len()
            ))
        })
}

/// Validate every token given for the filter `name`. Request keys never reach a rule
/// string, so `,` and `|` in them cannot alter the rules.
fn validate_filter<C: Container>(
    config: &CollectionConfig<C>,
    validator: &Validator<'_>,
    errors: &mut ValidationErrors,
    filter_key: &str,
    name: &str,
    tokens: &[String],
) -> Result<(), ApiError> {
    let attribute = format!("{filter_key}.{name}");
    if !validator.check(errors, &attribute, name, "filter_type")? {
        return Ok(());
    }
    let Some(filter) = config.filter_type(name) else {
        return Ok(());
    };

    let param_rules = [filter.value_kind().validation_rule(), filter.validation_rules()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("|");

    for (index, token) in tokens.iter().enumerate() {
        let attribute = if tokens.len() == 1 {
            attribute.clone()
        } else {
            format!("{attribute}.{index}")
        };
        if !validator.check(errors, &attribute, token, "required")? {
            continue;
        }

        let item = parse_filter_item(token);
        let Ok(operator) = item.operator() else {
            errors.add(ValidationError::new(
                &attribute,
                format!("The filter operator '{}' is not supported.", item.operator),
            ));
            continue;
        };
        if !filter.supports(operator) {
            errors.add(ValidationError::new(
                &attribute,
                format!("The filter operator '{operator}' is not allowed for '{name}'."),
            ));
            continue;
        }
        if !validator.check(errors, &attribute, token, "filter_param_count")? {
            continue;
        }

        for param in &item.params {
            validator.check(errors, &attribute, param, &param_rules)?;
        }
    }
    Ok(())
}

/// Scalar parameter `key`; a bracketed `key[...]` is reported as invalid
fn scalar<'a>(
    request: &'a CollectionRequest,
    errors: &mut ValidationErrors,
    key: &str,
) -> Option<&'a str> {
    let value = request.get(key);
    if value.is_none() && request.has(key) {
        errors.add(ValidationError::new(key, format!("The {key} must be a single value.")));
    }
    value
}

/// Bracketed parameter `key`; a plain scalar is reported as invalid
fn query_map(request: &CollectionRequest, errors: &mut ValidationErrors, key: &str) -> QueryMap {
    match request.map(key) {
        Ok(map) => map.unwrap_or_default(),
        Err(malformed) => {
            errors.add(ValidationError::new(
                &malformed.name,
                format!("The {} must be an array.", malformed.name),
            ));
            Vec::new()
        }
    }
}

fn apply_query<C: Container>(
    config: &CollectionConfig<C>,
    query: &ValidatedQuery,
    container: &mut C,
) -> Result<(), ApiError> {
    for (name, tokens) in &query.filters {
        let filter = config.filter_type(name).ok_or_else(|| {
            ApiError::internal(
                "Filter could not be applied",
                Some(format!("no filter type named '{name}'")),
            )
        })?;

        for token in tokens {
            let item = parse_filter_item(token);
            let operator = item.operator().map_err(|e| {
                ApiError::internal("Filter could not be applied", Some(e.to_string()))
            })?;
            filter.apply(container, operator, &item.params)?;
        }
    }

    for (name, direction) in &query.sort {
        let sort = config.sort_type(name).ok_or_else(|| {
            ApiError::internal(
                "Sort could not be applied",
                Some(format!("no sort type named '{name}'")),
            )
        })?;
        sort.apply(container, *direction)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{CollectionContainer, RawPage};
    use crate::filtering::{FilterOperator, ValueKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Items = CollectionContainer<Value>;

    fn messages() -> Items {
        CollectionContainer::new(vec![
            json!({"id": 1, "content": "Hello world!", "created": 1}),
            json!({"id": 2, "content": "We love the president", "created": 2}),
            json!({"id": 3, "content": "I love pizza", "created": 3}),
            json!({"id": 4, "content": "", "created": 4}),
        ])
        .unwrap()
    }

    fn config() -> Arc<CollectionConfig<Items>> {
        Arc::new(
            CollectionConfig::builder()
                .filter(FilterType::new("content"))
                .filter(FilterType::new("created").kind(ValueKind::Integer))
                .sort(SortType::new("created"))
                .default_sort("created", SortDirection::Desc)
                .build()
                .unwrap(),
        )
    }

    fn collection(query: &str) -> MasonCollection<Items> {
        MasonCollection::new(config(), CollectionRequest::from_query("/sms", query), messages())
    }

    fn fields(err: &ApiError) -> Vec<&str> {
        err.validation_errors()
            .unwrap()
            .iter()
            .map(|e| e.field.as_str())
            .collect()
    }

    #[test]
    fn test_build_rejects_bad_configuration() {
        let duplicate = CollectionConfig::<Items>::builder()
            .filter(FilterType::new("content"))
            .filter(FilterType::new("content"))
            .build();
        assert!(matches!(duplicate, Err(ApiError::Configuration { .. })));

        let unknown_default = CollectionConfig::<Items>::builder()
            .sort(SortType::new("created"))
            .default_sort("scheduled", SortDirection::Asc)
            .build();
        assert!(matches!(unknown_default, Err(ApiError::Configuration { .. })));

        let page_sizes = CollectionConfig::<Items>::builder()
            .default_per_page(50)
            .max_per_page(20)
            .build();
        assert!(matches!(page_sizes, Err(ApiError::Configuration { .. })));
    }

    #[test]
    fn test_pagination_settings_deserialize_with_defaults() {
        let settings: PaginationSettings = serde_json::from_value(json!({"max_per_page": 50})).unwrap();
        assert_eq!(settings.default_per_page, DEFAULT_PER_PAGE);
        assert_eq!(settings.max_per_page, 50);
    }

    #[tokio::test]
    async fn test_default_sort_and_meta() {
        let document = collection("").assemble().await.unwrap();
        let ids: Vec<_> = document.items.iter().map(|i| i["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
        assert_eq!(
            document.meta.sort,
            Some(vec![("created".to_string(), SortDirection::Desc)])
        );
        assert_eq!(document.meta.filters, None);
        assert_eq!(document.limit, DEFAULT_PER_PAGE);
    }

    #[tokio::test]
    async fn test_conjunctive_filter_tokens() {
        let mut collection =
            collection("filters[content][]=not-empty&filters[content][]=contains:president");
        let document = collection.assemble().await.unwrap();
        assert_eq!(document.total, 1);
        assert_eq!(document.items[0]["id"], 2);
    }

    #[tokio::test]
    async fn test_validation_aggregates_every_violation() {
        let err = collection("limit=0&offset=-1&filters[snake]=empty&sort[created]=sideways&fields=most")
            .assemble()
            .await
            .unwrap_err();
        assert_eq!(
            fields(&err),
            vec!["limit", "offset", "fields", "filters.snake", "sort.created"]
        );
    }

    #[tokio::test]
    async fn test_operator_and_arity_validation() {
        let err = collection("filters[content]=jumps").assemble().await.unwrap_err();
        assert_eq!(fields(&err), vec!["filters.content"]);

        let err = collection("filters[created]=between:5").assemble().await.unwrap_err();
        assert!(err.validation_errors().unwrap()[0].message.contains("exactly two parameters"));

        // Value kind applies to every parameter
        let err = collection("filters[created][]=gte:soon&filters[created][]=lt:5")
            .assemble()
            .await
            .unwrap_err();
        assert_eq!(fields(&err), vec!["filters.created.0"]);
    }

    #[tokio::test]
    async fn test_restricted_operators() {
        let config = Arc::new(
            CollectionConfig::<Items>::builder()
                .filter(FilterType::new("created").operators([FilterOperator::Between]))
                .build()
                .unwrap(),
        );
        let mut collection = MasonCollection::new(
            config,
            CollectionRequest::from_query("/sms", "filters[created]=eq:1"),
            messages(),
        );
        let err = collection.assemble().await.unwrap_err();
        assert!(err.validation_errors().unwrap()[0].message.contains("not allowed"));
    }

    #[tokio::test]
    async fn test_malformed_maps_are_rejected() {
        let err = collection("filters=abc&sort=created").assemble().await.unwrap_err();
        assert_eq!(fields(&err), vec!["filters", "sort"]);
    }

    #[tokio::test]
    async fn test_legacy_filter_key() {
        let document = collection("filter[content]=contains:love").assemble().await.unwrap();
        assert_eq!(document.total, 2);
        assert_eq!(
            document.meta.filters,
            Some(vec![("content".to_string(), vec!["contains:love".to_string()])])
        );
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_collection_pending() {
        let mut collection = collection("limit=abc");
        assert!(collection.validate().is_err());
        assert!(collection.validate().is_err());
        assert!(!collection.is_assembled());
    }

    #[tokio::test]
    async fn test_page_vocabulary() {
        let document = collection("page=1&page_size=3").assemble().await.unwrap();
        assert_eq!(document.offset, 3);
        assert_eq!(document.limit, 3);
        assert_eq!(document.items.len(), 1);
        let prev = document.controls.prev.unwrap().href;
        assert!(prev.contains("offset=0"), "{prev}");
        assert!(!prev.contains("page="), "{prev}");
    }

    #[derive(Clone, serde::Serialize)]
    struct Note {
        id: i64,
        body: String,
    }

    impl Representable for Note {
        fn brief_representation(&self) -> Option<Value> {
            Some(json!({"id": self.id}))
        }
    }

    #[tokio::test]
    async fn test_fields_modes() {
        let notes = vec![
            Note { id: 1, body: "first".to_string() },
            Note { id: 2, body: "second".to_string() },
        ];
        let config = Arc::new(CollectionConfig::<CollectionContainer<Note>>::builder().build().unwrap());
        let render = |query: &'static str| {
            let config = Arc::clone(&config);
            let container = CollectionContainer::new(notes.clone()).unwrap();
            async move {
                config
                    .populate(CollectionRequest::from_query("/notes", query), container)
                    .await
                    .unwrap()
                    .items
            }
        };

        assert_eq!(render("fields=brief").await, vec![json!({"id": 1}), json!({"id": 2})]);
        // No full representation, so the serde dump is used
        assert_eq!(render("fields=full&limit=1").await, vec![json!({"id": 1, "body": "first"})]);
        assert_eq!(render("limit=1").await, vec![json!({"id": 1, "body": "first"})]);
    }

    #[tokio::test]
    async fn test_item_renderer_ignores_fields() {
        let config = Arc::new(
            CollectionConfig::<Items>::builder()
                .item_renderer(|item| json!({"label": item["content"]}))
                .build()
                .unwrap(),
        );
        let document = config
            .populate(CollectionRequest::from_query("/sms", "fields=brief&limit=1"), messages())
            .await
            .unwrap();
        assert_eq!(document.items, vec![json!({"label": "Hello world!"})]);
    }

    /// Counts filter applications and fetches, failing the first fetch on request
    struct CountingContainer {
        inner: Items,
        applied: Arc<AtomicUsize>,
        fetches: usize,
        fail_first_fetch: bool,
    }

    #[async_trait]
    impl Container for CountingContainer {
        type Item = Value;

        const BACKEND: &'static str = "counting";

        fn apply_filter(
            &mut self,
            filter: &FilterType<Self>,
            operator: FilterOperator,
            params: &[String],
        ) -> Result<&mut Self, ApiError> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            let inner_filter = FilterType::new(filter.field_name());
            self.inner.apply_filter(&inner_filter, operator, params)?;
            Ok(self)
        }

        fn set_sorting(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self, ApiError> {
            self.inner.set_sorting(field, direction)?;
            Ok(self)
        }

        async fn get_items(&mut self, limit: u64, offset: u64) -> Result<RawPage<Value>, ApiError> {
            self.fetches += 1;
            if self.fail_first_fetch && self.fetches == 1 {
                return Err(ApiError::backend("flaky"));
            }
            self.inner.get_items(limit, offset).await
        }
    }

    fn counting(query: &str, fail_first_fetch: bool) -> (MasonCollection<CountingContainer>, Arc<AtomicUsize>) {
        let applied = Arc::new(AtomicUsize::new(0));
        let config = Arc::new(
            CollectionConfig::<CountingContainer>::builder()
                .filter(FilterType::new("content"))
                .build()
                .unwrap(),
        );
        let container = CountingContainer {
            inner: messages(),
            applied: Arc::clone(&applied),
            fetches: 0,
            fail_first_fetch,
        };
        let collection =
            MasonCollection::new(config, CollectionRequest::from_query("/sms", query), container);
        (collection, applied)
    }

    #[tokio::test]
    async fn test_assemble_is_idempotent() {
        let (mut collection, applied) = counting("filters[content]=contains:love", false);

        let first = collection.assemble().await.unwrap();
        let second = collection.assemble().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(applied.load(Ordering::SeqCst), 1);
        assert_eq!(collection.container().fetches, 1);
        assert!(collection.is_assembled());
    }

    #[tokio::test]
    async fn test_failed_fetch_can_be_retried_without_reapplying() {
        let (mut collection, applied) = counting("filters[content]=contains:love", true);

        let err = collection.assemble().await.unwrap_err();
        assert!(matches!(err, ApiError::Backend { .. }));

        let document = collection.assemble().await.unwrap();
        assert_eq!(document.total, 2);
        assert_eq!(applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_apply_failure_poisons_collection() {
        let config = Arc::new(
            CollectionConfig::<Items>::builder()
                .filter(FilterType::new("content").apply_with(|_, _, _, _| {
                    Err(ApiError::unsupported_operator("contains", "in-memory"))
                }))
                .build()
                .unwrap(),
        );
        let mut collection = MasonCollection::new(
            config,
            CollectionRequest::from_query("/sms", "filters[content]=contains:love"),
            messages(),
        );

        let err = collection.assemble().await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedOperator { .. }));

        let err = collection.assemble().await.unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));
    }
}
