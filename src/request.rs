//! Read-only view of a collection request's query string.
//!
//! Query strings use the bracket conventions common to form-encoded APIs:
//!
//! ```text
//! ?limit=10&offset=20
//! &sort[created]=desc
//! &filters[content]=contains:president
//! &filters[created][]=gte:1430404502&filters[created][]=lt:1430404505
//! ```
//!
//! `name[key]=value` sets the value list of `key` (a repeated assignment replaces it),
//! while `name[key][]=value` and `name[key][0]=value` append to it.

use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::Uri;
use axum::http::request::Parts;
use std::convert::Infallible;
use url::form_urlencoded;

/// Ordered `key -> values` pairs decoded from one bracketed query parameter
pub type QueryMap = Vec<(String, Vec<String>)>;

/// A bracketed parameter that was given as a plain scalar, e.g. `?filters=abc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedParam {
    pub name: String,
}

/// Query parameters of one collection request, in their original order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionRequest {
    path: String,
    pairs: Vec<(String, String)>,
}

impl CollectionRequest {
    /// Build from a path and an already decoded list of query pairs
    pub fn new<K, V>(path: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: path.into(),
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build from a path and a raw (percent-encoded) query string
    pub fn from_query(path: impl Into<String>, query: &str) -> Self {
        Self {
            path: path.into(),
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    #[must_use]
    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_query(uri.path(), uri.query().unwrap_or_default())
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Last scalar value of `key`; bracketed forms of the key are not included
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Whether `key` is present, as a scalar or in bracketed form
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| base_name(k) == key)
    }

    /// Decode the bracketed parameter `name`, e.g. every `filters[...]` pair.
    ///
    /// Returns `Ok(None)` when `name` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedParam`] when `name` is also given as a plain scalar.
    pub fn map(&self, name: &str) -> Result<Option<QueryMap>, MalformedParam> {
        let mut map: QueryMap = Vec::new();
        let mut found = false;

        for (key, value) in &self.pairs {
            if base_name(key) != name {
                continue;
            }
            found = true;

            let Some((entry, append)) = bracket_key(&key[name.len()..]) else {
                return Err(MalformedParam {
                    name: name.to_string(),
                });
            };

            let position = map.iter().position(|(k, _)| *k == entry);
            match (position, append) {
                (Some(index), true) => map[index].1.push(value.clone()),
                (Some(index), false) => map[index].1 = vec![value.clone()],
                (None, _) => map.push((entry.to_string(), vec![value.clone()])),
            }
        }

        Ok(found.then_some(map))
    }

    /// Same request with `offset` set to `offset` and `page` removed, as a path plus
    /// query string
    #[must_use]
    pub fn url_with_offset(&self, offset: u64) -> String {
        let offset = offset.to_string();
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut replaced = false;

        for (key, value) in &self.pairs {
            match key.as_str() {
                "page" => {}
                "offset" if replaced => {}
                "offset" => {
                    serializer.append_pair(key, &offset);
                    replaced = true;
                }
                _ => {
                    serializer.append_pair(key, value);
                }
            }
        }
        if !replaced {
            serializer.append_pair("offset", &offset);
        }

        format!("{}?{}", self.path, serializer.finish())
    }
}

/// `filters` for `filters`, `filters[x]` and `filters[x][]`
fn base_name(key: &str) -> &str {
    key.split_once('[').map_or(key, |(base, _)| base)
}

/// Split `[entry]` or `[entry][...]` into the entry and whether the value appends
fn bracket_key(rest: &str) -> Option<(&str, bool)> {
    let inner = rest.strip_prefix('[')?;
    let (entry, tail) = inner.split_once(']')?;
    if entry.is_empty() {
        return None;
    }
    Some((entry, !tail.is_empty()))
}

impl<S> FromRequestParts<S> for CollectionRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    #[allow(clippy::manual_async_fn)]
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Nested routers see a stripped URI; links must use the full one
            let uri = parts
                .extensions
                .get::<OriginalUri>()
                .map_or(&parts.uri, |original| &original.0);
            Ok(Self::from_uri(uri))
        }
    }
}
