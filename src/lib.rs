//! # mason-collection
//!
//! Filtering, sorting and pagination of collection endpoints that answer with Mason
//! hypermedia documents, for Axum and Sea-ORM.
//!
//! A request such as
//!
//! ```text
//! GET /sms?filters[content]=contains:love&sort[created]=desc&limit=5
//! ```
//!
//! is validated against the filters and sorts an endpoint declares, applied to a
//! [`Container`] (a Sea-ORM query, an in-memory list or a remote API query) and turned
//! into one page with `first`/`prev`/`next`/`last` links.
//!
//! ```rust,ignore
//! use mason_collection::{
//!     ApiError, CollectionConfig, CollectionDocument, CollectionRequest, EntityContainer,
//!     FilterType, SortDirection, SortType, ValueKind,
//! };
//!
//! let sms_collection = Arc::new(
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

pub mod collection;
pub mod container;
pub mod document;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod pagination;
pub mod request;
pub mod validation;

pub use collection::{CollectionConfig, CollectionConfigBuilder, MasonCollection, PaginationSettings};
pub use container::{
    CollectionContainer, Container, EntityContainer, RawPage, RemoteContainer, RemoteQuery,
};
pub use document::{
    CollectionDocument, CollectionMeta, Control, FieldsMode, ItemRenderer, MASON_MIME_TYPE,
    PaginationControls, Representable,
};
pub use errors::ApiError;
pub use filtering::{
    FilterItem, FilterOperator, FilterType, SortDirection, SortType, ValueKind, parse_filter_item,
};
pub use models::{CollectionParams, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use pagination::{MAX_OFFSET, PageOffsets, PageWindow};
pub use request::CollectionRequest;
pub use validation::{ValidationError, ValidationErrors, Validator};
