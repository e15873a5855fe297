//! Search result types.
//!
//! [`Results`] wraps the raw response of a search together with the query that
//! produced it. Hits are converted into domain objects on first access through
//! the [`TypeConversions`] supplied by the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::warn;

use crate::types::search_query::Query;

/// Error returned by a conversion callback. The hit it was converting is dropped.
pub type ConversionError = Box<dyn std::error::Error + Send + Sync>;

type ConvertFn<T> = Arc<dyn Fn(&str) -> Result<T, ConversionError> + Send + Sync>;

/// A domain object that search hits can be converted into.
///
/// Types that want to keep the stored document alongside the loaded object
/// return their slot from [`SearchDocument::document_slot`]; the materializer
/// fills it with the hit's `_source`.
pub trait SearchDocument {
    /// Where to store the hit's `_source`, if this type keeps it.
    fn document_slot(&mut self) -> Option<&mut Option<Value>> {
        None
    }
}

impl SearchDocument for Value {}

/// Conversion callbacks keyed by the `_type` tag of a hit.
///
/// Each callback receives the hit's `_id` and loads the matching domain object.
pub struct TypeConversions<T> {
    conversions: HashMap<String, ConvertFn<T>>,
}

impl<T> Default for TypeConversions<T> {
    fn default() -> Self {
        Self {
            conversions: HashMap::new(),
        }
    }
}

impl<T> Clone for TypeConversions<T> {
    fn clone(&self) -> Self {
        Self {
            conversions: self.conversions.clone(),
        }
    }
}

impl<T> fmt::Debug for TypeConversions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.conversions.keys().collect();
        types.sort();
        f.debug_struct("TypeConversions")
            .field("types", &types)
            .finish()
    }
}

impl<T> TypeConversions<T> {
    /// Create an empty set of conversions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback used for hits tagged `type_name`, replacing any previous one.
    pub fn define<F>(mut self, type_name: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str) -> Result<T, ConversionError> + Send + Sync + 'static,
    {
        self.insert(type_name, convert);
        self
    }

    /// Register a callback in place.
    pub fn insert<F>(&mut self, type_name: impl Into<String>, convert: F)
    where
        F: Fn(&str) -> Result<T, ConversionError> + Send + Sync + 'static,
    {
        self.conversions.insert(type_name.into(), Arc::new(convert));
    }

    /// Whether a callback is registered for `type_name`.
    pub fn contains(&self, type_name: &str) -> bool {
        self.conversions.contains_key(type_name)
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    /// Returns true if no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }

    fn get(&self, type_name: &str) -> Option<&ConvertFn<T>> {
        self.conversions.get(type_name)
    }
}

/// One materialized search hit.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit<T> {
    /// The hit was converted by its type's callback.
    Converted(T),
    /// No callback is registered for the hit's type; this is the raw hit.
    Raw(Value),
}

impl<T> Hit<T> {
    /// The converted object, if this hit was converted.
    pub fn as_converted(&self) -> Option<&T> {
        match self {
            Hit::Converted(object) => Some(object),
            Hit::Raw(_) => None,
        }
    }

    /// The raw hit, if no conversion applied.
    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Hit::Converted(_) => None,
            Hit::Raw(raw) => Some(raw),
        }
    }

    /// Returns true if this hit was converted.
    pub fn is_converted(&self) -> bool {
        matches!(self, Hit::Converted(_))
    }
}

/// The outcome of a search: pagination metadata plus lazily converted hits.
///
/// Conversion runs once, on the first indexed access or iteration. A hit whose
/// callback fails is dropped, so [`Results::len`] can be smaller than the
/// number of raw hits.
pub struct Results<T> {
    query: Query,
    body: Value,
    conversions: TypeConversions<T>,
    hits: OnceLock<Vec<Hit<T>>>,
}

impl<T> fmt::Debug for Results<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results")
            .field("query", &self.query)
            .field("body", &self.body)
            .field("conversions", &self.conversions)
            .field("materialized", &self.hits.get().is_some())
            .finish()
    }
}

impl<T> Results<T> {
    /// Wrap a raw search response.
    ///
    /// # Arguments
    ///
    /// * `query` - The query that produced the response
    /// * `body` - The decoded response body
    /// * `conversions` - Callbacks used to turn hits into domain objects
    pub fn new(query: Query, body: Value, conversions: TypeConversions<T>) -> Self {
        Self {
            query,
            body,
            conversions,
            hits: OnceLock::new(),
        }
    }

    /// The query that produced these results.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The raw response body.
    pub fn raw_body(&self) -> &Value {
        &self.body
    }

    /// Total number of matching documents reported by the service.
    ///
    /// Reads `hits.total`, accepting either a number or an object with a
    /// `value` field. Missing or malformed totals count as zero.
    pub fn total_entries(&self) -> u64 {
        let total = self.body.get("hits").and_then(|hits| hits.get("total"));
        match total {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        }
    }

    /// Results per page, taken from the query.
    pub fn per_page(&self) -> u32 {
        self.query.page_size()
    }

    /// Number of pages needed to show every matching document.
    pub fn total_pages(&self) -> u64 {
        let per_page = u64::from(self.per_page());
        if per_page == 0 {
            return 0;
        }
        self.total_entries().div_ceil(per_page)
    }

    /// The current page, 1 when the query did not set one.
    pub fn current_page(&self) -> u32 {
        self.query.current_page().unwrap_or(1)
    }

    /// The following page, or `None` on the last page.
    pub fn next_page(&self) -> Option<u32> {
        let current = self.current_page();
        (u64::from(current) < self.total_pages()).then(|| current + 1)
    }

    /// The preceding page, or `None` on the first page.
    pub fn previous_page(&self) -> Option<u32> {
        let current = self.current_page();
        (current > 1).then(|| current - 1)
    }

    /// Returns true if the service reported no matching documents.
    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }
}

impl<T: SearchDocument> Results<T> {
    /// The materialized hit at `index`.
    pub fn get(&self, index: usize) -> Option<&Hit<T>> {
        self.hits().get(index)
    }

    /// Iterate over the materialized hits.
    pub fn iter(&self) -> std::slice::Iter<'_, Hit<T>> {
        self.hits().iter()
    }

    /// Number of materialized hits.
    pub fn len(&self) -> usize {
        self.hits().len()
    }

    /// All materialized hits.
    pub fn hits(&self) -> &[Hit<T>] {
        self.hits.get_or_init(|| self.materialize())
    }

    fn materialize(&self) -> Vec<Hit<T>> {
        let Some(raw_hits) = self
            .body
            .get("hits")
            .and_then(|hits| hits.get("hits"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        raw_hits.iter().filter_map(|raw| self.convert(raw)).collect()
    }

    fn convert(&self, raw: &Value) -> Option<Hit<T>> {
        let convert = raw
            .get("_type")
            .and_then(Value::as_str)
            .and_then(|type_name| self.conversions.get(type_name));

        let Some(convert) = convert else {
            return Some(Hit::Raw(raw.clone()));
        };

        let id = hit_id(raw);
        match (convert.as_ref())(&id) {
            Ok(mut object) => {
                if let Some(slot) = object.document_slot() {
                    *slot = raw.get("_source").cloned();
                }
                Some(Hit::Converted(object))
            }
            Err(e) => {
                warn!(
                    hit_type = ?raw.get("_type"),
                    hit_id = %id,
                    error = %e,
                    "Dropping search hit that failed to convert"
                );
                None
            }
        }
    }
}

impl<'a, T: SearchDocument> IntoIterator for &'a Results<T> {
    type Item = &'a Hit<T>;
    type IntoIter = std::slice::Iter<'a, Hit<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The `_id` of a hit as a string. Numeric ids are rendered in decimal.
fn hit_id(raw: &Value) -> String {
    match raw.get("_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
