//! The assembled collection document and how items are rendered into it.
//!
//! ```json
//! {
//!   "@meta": {"sort": {"created": "desc"}, "filters": {"content": ["contains:love"]}},
//!   "items": [...],
//!   "total": 25,
//!   "offset": 0,
//!   "limit": 10,
//!   "total_pages": 3,
//!   "@controls": {
//!     "first": {"href": "/sms?limit=10&offset=0"},
//!     "next": {"href": "/sms?limit=10&offset=10"},
//!     "last": {"href": "/sms?limit=10&offset=20"}
//!   }
//! }
//! ```

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::filtering::SortDirection;
use crate::pagination::PageOffsets;
use crate::request::CollectionRequest;

/// Media type of Mason hypermedia documents
pub const MASON_MIME_TYPE: &str = "application/vnd.mason+json";

/// Caller-supplied item rendering, replacing every other rendering strategy
pub type ItemRenderer<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Item rendering mode selected by the `fields` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldsMode {
    #[default]
    All,
    Full,
    Brief,
}

impl FromStr for FieldsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "full" => Ok(Self::Full),
            "brief" => Ok(Self::Brief),
            other => Err(format!("invalid fields mode '{other}'")),
        }
    }
}

/// Items that know how to present themselves in a collection.
///
/// Both representations default to `None`, in which case the item's serde
/// serialization is used as is.
///
/// ```rust,ignore
/// impl Representable for sms::Model {
///     fn brief_representation(&self) -> Option<Value> {
///         Some(json!({"id": self.id, "content": self.content}))
///     }
/// }
/// ```
pub trait Representable: Serialize {
    fn full_representation(&self) -> Option<Value> {
        None
    }

    fn brief_representation(&self) -> Option<Value> {
        None
    }
}

impl Representable for Value {}

/// Render one item: the renderer if configured, else the representation matching
/// `fields`, else a plain dump of the item's fields.
///
/// # Errors
///
/// Returns an internal error when the item cannot be serialized.
pub fn render_item<T: Representable>(
    item: &T,
    fields: FieldsMode,
    renderer: Option<&ItemRenderer<T>>,
) -> Result<Value, ApiError> {
    if let Some(renderer) = renderer {
        return Ok(renderer(item));
    }

    let represented = match fields {
        FieldsMode::Brief => item
            .brief_representation()
            .or_else(|| item.full_representation()),
        FieldsMode::All | FieldsMode::Full => item.full_representation(),
    };

    match represented {
        Some(value) => Ok(value),
        None => serde_json::to_value(item)
            .map_err(|e| ApiError::internal("Failed to render item", Some(e.to_string()))),
    }
}

/// A hypermedia link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub href: String,
}

/// Navigation links of a page; missing links are left out of the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationControls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<Control>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Control>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Control>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<Control>,
}

impl PaginationControls {
    /// Turn link offsets into links on the request's own URL
    #[must_use]
    pub fn from_offsets(offsets: PageOffsets, request: &CollectionRequest) -> Self {
        let link = |offset: Option<u64>| {
            offset.map(|offset| Control {
                href: request.url_with_offset(offset),
            })
        };

        Self {
            first: link(offsets.first),
            prev: link(offsets.prev),
            next: link(offsets.next),
            last: link(offsets.last),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.prev.is_none() && self.next.is_none() && self.last.is_none()
    }
}

/// Echo of the sorting and filtering that was applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionMeta {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "ordered_map"
    )]
    pub sort: Option<Vec<(String, SortDirection)>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "ordered_map"
    )]
    pub filters: Option<Vec<(String, Vec<String>)>>,
}

impl CollectionMeta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sort.is_none() && self.filters.is_none()
    }
}

#[allow(clippy::ref_option)]
fn ordered_map<S, V>(entries: &Option<Vec<(String, V)>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    match entries {
        Some(entries) => serializer.collect_map(entries.iter().map(|(k, v)| (k, v))),
        None => serializer.serialize_none(),
    }
}

/// One assembled page of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDocument {
    #[serde(rename = "@meta", skip_serializing_if = "CollectionMeta::is_empty")]
    pub meta: CollectionMeta,
    pub items: Vec<Value>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub total_pages: u64,
    #[serde(rename = "@controls", skip_serializing_if = "PaginationControls::is_empty")]
    pub controls: PaginationControls,
}

impl CollectionDocument {
    /// The document as a property map, for embedding into a larger document
    ///
    /// # Errors
    ///
    /// Returns an internal error when the document cannot be serialized.
    pub fn to_properties(&self) -> Result<Map<String, Value>, ApiError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(properties)) => Ok(properties),
            Ok(other) => Err(ApiError::internal(
                "Failed to render collection",
                Some(format!("expected an object, got {other}")),
            )),
            Err(e) => Err(ApiError::internal(
                "Failed to render collection",
                Some(e.to_string()),
            )),
        }
    }
}

impl fmt::Display for CollectionDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} items (offset {}, limit {})",
            self.items.len(),
            self.total,
            self.offset,
            self.limit
        )
    }
}

impl IntoResponse for CollectionDocument {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, MASON_MIME_TYPE)],
                body,
            )
                .into_response(),
            Err(e) => {
                ApiError::internal("Failed to render collection", Some(e.to_string())).into_response()
            }
        }
    }
}
