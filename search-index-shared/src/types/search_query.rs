//! Search query builder.
//!
//! This module accumulates the pieces of a search (free text, sort order,
//! term filters, pagination) and renders them into the JSON body posted to
//! `<index>/_search`.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::QueryBuildError;

/// Number of results per page when none is set.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Sort key appended after every caller-supplied sort field.
const SCORE_SORT: &str = "_score";

/// Direction of a sort field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order. This is the default.
    #[default]
    Desc,
}

impl SortDirection {
    /// The direction as written in the query body.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Search query parameters.
///
/// Setters are cheap and order-sensitive. [`Query::body`] renders the canonical
/// body once and caches it; every setter clears that cache, so the body always
/// reflects the current state of the query.
///
/// # Example
///
/// ```
/// use search_index_shared::{Query, SortDirection};
///
/// let mut query = Query::new();
/// query.set_text("blockchain");
/// query.add_sort_by("created_at", SortDirection::Asc);
/// query.filter_on_term("organization_id", 14);
/// query.set_current_page(2);
///
/// assert_eq!(query.body()["from"], 10);
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    text: Option<String>,
    sort_fields: Vec<(String, SortDirection)>,
    filters: Vec<Map<String, Value>>,
    page_size: u32,
    current_page: Option<u32>,
    body: OnceLock<Value>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.sort_fields == other.sort_fields
            && self.filters == other.filters
            && self.page_size == other.page_size
            && self.current_page == other.current_page
    }
}

impl Query {
    /// Create an empty query with the default page size.
    pub fn new() -> Self {
        Self {
            text: None,
            sort_fields: Vec::new(),
            filters: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            current_page: None,
            body: OnceLock::new(),
        }
    }

    /// The free-text query string, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Sort fields in the order they were added. `_score` is not stored here.
    pub fn sort_fields(&self) -> &[(String, SortDirection)] {
        &self.sort_fields
    }

    /// Term filters in the order they were added.
    pub fn filters(&self) -> &[Map<String, Value>] {
        &self.filters
    }

    /// Number of results per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The requested page, 1-based.
    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    /// Set the free-text query. Blank text is kept but not rendered.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
        self.invalidate();
    }

    /// Add a field and direction to sort on. Fields are applied in the order added.
    pub fn add_sort_by(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.sort_fields.push((field.into(), direction));
        self.invalidate();
    }

    /// Add a descending sort on `field`.
    pub fn add_sort_field(&mut self, field: impl Into<String>) {
        self.add_sort_by(field, SortDirection::Desc);
    }

    /// Add a term filter. All filters must match.
    pub fn filter_on(&mut self, terms: Map<String, Value>) {
        self.filters.push(terms);
        self.invalidate();
    }

    /// Add a single-term filter on `field`.
    pub fn filter_on_term(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let mut terms = Map::new();
        terms.insert(field.into(), value.into());
        self.filter_on(terms);
    }

    /// Set how many results make up a page. Zero is raised to one.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.invalidate();
    }

    /// Set the page to return, 1-based.
    pub fn set_current_page(&mut self, page: u32) {
        self.current_page = Some(page);
        self.invalidate();
    }

    /// Parse and set the page size from user input such as a query-string parameter.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If `value` is a non-negative integer
    /// * `Err(QueryBuildError::InvalidNumber)` - Otherwise; the query is left unchanged
    pub fn parse_page_size(&mut self, value: &str) -> Result<(), QueryBuildError> {
        let page_size = parse_number("page_size", value)?;
        self.set_page_size(page_size);
        Ok(())
    }

    /// Parse and set the current page from user input.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If `value` is a non-negative integer
    /// * `Err(QueryBuildError::InvalidNumber)` - Otherwise; the query is left unchanged
    pub fn parse_current_page(&mut self, value: &str) -> Result<(), QueryBuildError> {
        let page = parse_number("current_page", value)?;
        self.set_current_page(page);
        Ok(())
    }

    /// The search body for this query.
    ///
    /// The body always contains `sort` (ending with `_score`), `size` and
    /// `explain: true`. `query` appears for non-blank text, `filter` for one or
    /// more filters, and `from` once a current page is set.
    pub fn body(&self) -> &Value {
        self.body.get_or_init(|| self.build_body())
    }

    fn invalidate(&mut self) {
        self.body = OnceLock::new();
    }

    fn build_body(&self) -> Value {
        let mut body = Map::new();

        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            body.insert(
                "query".to_string(),
                json!({ "query_string": { "query": text } }),
            );
        }

        body.insert("sort".to_string(), self.sort_body());

        if !self.filters.is_empty() {
            let terms: Vec<Value> = self
                .filters
                .iter()
                .map(|filter| json!({ "term": filter }))
                .collect();
            body.insert("filter".to_string(), json!({ "and": terms }));
        }

        if let Some(page) = self.current_page {
            let from = u64::from(page.saturating_sub(1)) * u64::from(self.page_size);
            body.insert("from".to_string(), json!(from));
        }

        body.insert("size".to_string(), json!(self.page_size));
        body.insert("explain".to_string(), Value::Bool(true));

        Value::Object(body)
    }

    fn sort_body(&self) -> Value {
        let mut sort: Vec<Value> = self
            .sort_fields
            .iter()
            .map(|(field, direction)| {
                let mut entry = Map::new();
                entry.insert(field.clone(), Value::from(direction.as_str()));
                Value::Object(entry)
            })
            .collect();
        sort.push(Value::from(SCORE_SORT));
        Value::Array(sort)
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, QueryBuildError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| QueryBuildError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}
