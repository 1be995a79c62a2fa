use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

/// Page size used when a request names none
pub const DEFAULT_PER_PAGE: u64 = 10;

/// Largest page size a request may ask for
pub const MAX_PER_PAGE: u64 = 300;

/// Query parameters accepted by every collection endpoint.
///
/// # Filtering
/// `filters` is a map from filter name to a filter token `operator[:param[,param...]]`,
/// for example:
/// ```text
/// ?filters[content]=contains:president
/// ?filters[created]=between:1430404502,1430404504
/// ?filters[scheduled]=empty
/// ```
/// Use `filters[name][]=token` to give several tokens for one filter; they must all
/// match. A literal comma inside a parameter is written `\,`.
///
/// # Sorting
/// `sort` is a map from sort name to `asc` or `desc`; the first key is the primary one:
/// ```text
/// ?sort[created]=desc&sort[content]=asc
/// ```
///
/// # Pagination
/// Either `limit` and `offset`, or `page` and `page_size` (`offset = page * page_size`).
#[derive(Deserialize, IntoParams, ToSchema, Default)]
#[into_params(parameter_in = Query)]
pub struct CollectionParams {
    /// Number of items per page, between 1 and 300. Defaults to 10.
    #[param(example = 10, minimum = 1, maximum = 300)]
    pub limit: Option<u64>,
    /// Number of items to skip.
    #[param(example = 0, minimum = 0)]
    pub offset: Option<u64>,
    /// Zero-based page number, used when `offset` is not given.
    #[param(minimum = 0)]
    pub page: Option<u64>,
    /// Items per page, used with `page`.
    #[param(minimum = 1, maximum = 300)]
    pub page_size: Option<u64>,
    /// Filter tokens by filter name.
    ///
    /// Example: `filters[content]=contains:love`
    #[param(
        value_type = Option<Object>,
        style = DeepObject,
        explode,
        example = json!({"content": "contains:love", "created": "gte:1430404502"})
    )]
    pub filters: Option<HashMap<String, String>>,
    /// Sort directions by sort name.
    ///
    /// Example: `sort[created]=desc`
    #[param(
        value_type = Option<Object>,
        style = DeepObject,
        explode,
        example = json!({"created": "desc"})
    )]
    pub sort: Option<HashMap<String, String>>,
    /// Item rendering: `all` (default), `full` or `brief`.
    #[param(example = "brief")]
    pub fields: Option<String>,
}
