//! Backend-neutral query and update descriptions
//!
//! Services describe what they want with [`Filter`], [`Update`] and [`Query`];
//! each store backend translates them. The MongoDB store renders them as
//! BSON documents, the in-memory store evaluates them directly.

use bson::{doc, oid::ObjectId, Bson, Document};
use std::cmp::Ordering;

/// A single field condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value, or the array field contains it
    Eq(Bson),
    /// Negation of `Eq`
    Ne(Bson),
    /// Field equals one of the values
    In(Vec<Bson>),
    Gte(Bson),
    Lte(Bson),
    /// Case-insensitive string prefix
    Prefix(String),
}

/// Conjunction of field conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    /// Filter matching every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on the document id
    pub fn id(id: ObjectId) -> Self {
        Self::all().eq("_id", id)
    }

    pub fn eq(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Eq(value.into())));
        self
    }

    pub fn ne(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Ne(value.into())));
        self
    }

    pub fn is_in<V: Into<Bson>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions
            .push((field.to_string(), Condition::In(values)));
        self
    }

    pub fn gte(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Gte(value.into())));
        self
    }

    pub fn lte(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Lte(value.into())));
        self
    }

    pub fn prefix(mut self, field: &str, prefix: &str) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Prefix(prefix.to_string())));
        self
    }

    /// Add the condition only when the value is present
    pub fn eq_opt<V: Into<Bson>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    /// Render as a MongoDB query document
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        for (field, condition) in &self.conditions {
            let rendered = match condition {
                Condition::Eq(v) => v.clone(),
                Condition::Ne(v) => Bson::Document(doc! { "$ne": v.clone() }),
                Condition::In(vs) => Bson::Document(doc! { "$in": vs.clone() }),
                Condition::Gte(v) => Bson::Document(doc! { "$gte": v.clone() }),
                Condition::Lte(v) => Bson::Document(doc! { "$lte": v.clone() }),
                Condition::Prefix(p) => Bson::Document(doc! {
                    "$regex": format!("^{}", regex::escape(p)),
                    "$options": "i",
                }),
            };
            merge_condition(&mut out, field, rendered);
        }
        out
    }

    /// Evaluate against a document
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            let value = document.get(field);
            match condition {
                Condition::Eq(expected) => value_matches(value, expected),
                Condition::Ne(expected) => !value_matches(value, expected),
                Condition::In(options) => options.iter().any(|o| value_matches(value, o)),
                Condition::Gte(bound) => value
                    .and_then(|v| compare_bson(v, bound))
                    .is_some_and(|o| o != Ordering::Less),
                Condition::Lte(bound) => value
                    .and_then(|v| compare_bson(v, bound))
                    .is_some_and(|o| o != Ordering::Greater),
                Condition::Prefix(prefix) => match value {
                    Some(Bson::String(s)) => s.to_lowercase().starts_with(&prefix.to_lowercase()),
                    _ => false,
                },
            }
        })
    }
}

/// Two range conditions on the same field must share one operator document.
fn merge_condition(out: &mut Document, field: &str, rendered: Bson) {
    let is_operator = |d: &Document| d.keys().all(|k| k.starts_with('$'));
    if let Bson::Document(extra) = &rendered {
        if is_operator(extra) {
            if let Some(Bson::Document(existing)) = out.get_mut(field) {
                if is_operator(existing) {
                    existing.extend(extra.clone());
                    return;
                }
            }
        }
    }
    out.insert(field, rendered);
}

fn value_matches(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, expected))
        }
        Some(v) => bson_eq(v, expected),
        None => matches!(expected, Bson::Null),
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match compare_bson(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Order two BSON values of comparable types; numbers compare across widths.
pub fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
    fn as_f64(v: &Bson) -> Option<f64> {
        match v {
            Bson::Int32(n) => Some(*n as f64),
            Bson::Int64(n) => Some(*n as f64),
            Bson::Double(n) => Some(*n),
            _ => None,
        }
    }

    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

/// A single update operation
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Bson),
    Inc(String, Bson),
    /// Append to an array unless already present
    AddToSet(String, Bson),
    /// Remove every occurrence from an array
    Pull(String, Bson),
}

/// Ordered list of update operations applied atomically to one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(field.to_string(), value.into()));
        self
    }

    pub fn inc(mut self, field: &str, by: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Inc(field.to_string(), by.into()));
        self
    }

    pub fn add_to_set(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.ops
            .push(UpdateOp::AddToSet(field.to_string(), value.into()));
        self
    }

    pub fn pull(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Pull(field.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Render as a MongoDB update document
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        for op in &self.ops {
            let (operator, field, value) = match op {
                UpdateOp::Set(f, v) => ("$set", f, v),
                UpdateOp::Inc(f, v) => ("$inc", f, v),
                UpdateOp::AddToSet(f, v) => ("$addToSet", f, v),
                UpdateOp::Pull(f, v) => ("$pull", f, v),
            };
            match out.get_mut(operator) {
                Some(Bson::Document(section)) => {
                    section.insert(field.clone(), value.clone());
                }
                _ => {
                    let mut section = Document::new();
                    section.insert(field.clone(), value.clone());
                    out.insert(operator, section);
                }
            }
        }
        out
    }

    /// Apply in place to a document
    pub fn apply(&self, document: &mut Document) {
        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    document.insert(field.clone(), value.clone());
                }
                UpdateOp::Inc(field, by) => {
                    let current = document.get(field).cloned().unwrap_or(Bson::Int64(0));
                    document.insert(field.clone(), add_numbers(&current, by));
                }
                UpdateOp::AddToSet(field, value) => {
                    let mut items = match document.get(field) {
                        Some(Bson::Array(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    if !items.iter().any(|item| bson_eq(item, value)) {
                        items.push(value.clone());
                    }
                    document.insert(field.clone(), items);
                }
                UpdateOp::Pull(field, value) => {
                    if let Some(Bson::Array(items)) = document.get_mut(field) {
                        items.retain(|item| !bson_eq(item, value));
                    }
                }
            }
        }
    }
}

fn add_numbers(current: &Bson, by: &Bson) -> Bson {
    match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => Bson::Int32(a + b),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a + b),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(*a as i64 + b),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a + *b as i64),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (_, by) => by.clone(),
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A filtered, sorted, paginated find
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub sort: Option<(String, SortOrder)>,
    pub skip: u64,
    pub limit: Option<i64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn newest_first(self) -> Self {
        self.sort("created_at", SortOrder::Descending)
    }

    pub fn page(mut self, page: Page) -> Self {
        self.skip = page.offset;
        self.limit = Some(page.limit);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Default page size for list queries
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Clamped limit/offset pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: Option<i32>, offset: Option<i32>) -> Self {
        let limit = limit
            .map(|l| (l as i64).clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = offset.map(|o| o.max(0) as u64).unwrap_or(0);
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_renders_operators() {
        let filter = Filter::all()
            .eq("status", "active")
            .gte("goal", 10i64)
            .lte("goal", 20i64)
            .ne("approved", false);

        let rendered = filter.to_document();
        assert_eq!(rendered.get_str("status").unwrap(), "active");
        let goal = rendered.get_document("goal").unwrap();
        assert_eq!(goal.get_i64("$gte").unwrap(), 10);
        assert_eq!(goal.get_i64("$lte").unwrap(), 20);
        assert!(rendered.get_document("approved").unwrap().contains_key("$ne"));
    }

    #[test]
    fn test_prefix_is_escaped() {
        let rendered = Filter::all().prefix("name", "a.b").to_document();
        let regex = rendered.get_document("name").unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), "^a\\.b");
    }

    #[test]
    fn test_matches_array_containment() {
        let id = ObjectId::new();
        let document = doc! { "attendees": [id, ObjectId::new()], "title": "Gala" };

        assert!(Filter::all().eq("attendees", id).matches(&document));
        assert!(!Filter::all().ne("attendees", id).matches(&document));
        assert!(Filter::all().prefix("title", "ga").matches(&document));
    }

    #[test]
    fn test_matches_numeric_across_widths() {
        let document = doc! { "stock": 5i32 };
        assert!(Filter::all().gte("stock", 5i64).matches(&document));
        assert!(!Filter::all().gte("stock", 6i64).matches(&document));
        assert!(Filter::all().is_in("stock", [1i64, 5i64]).matches(&document));
    }

    #[test]
    fn test_update_apply() {
        let id = ObjectId::new();
        let mut document = doc! { "count": 1i64, "likes": [] };

        Update::new()
            .inc("count", 2i64)
            .add_to_set("likes", id)
            .add_to_set("likes", id)
            .set("title", "x")
            .apply(&mut document);

        assert_eq!(document.get_i64("count").unwrap(), 3);
        assert_eq!(document.get_array("likes").unwrap().len(), 1);

        Update::new().pull("likes", id).apply(&mut document);
        assert!(document.get_array("likes").unwrap().is_empty());
    }

    #[test]
    fn test_update_renders_grouped_operators() {
        let rendered = Update::new()
            .set("a", 1i64)
            .set("b", 2i64)
            .inc("c", 1i64)
            .to_document();

        assert_eq!(rendered.get_document("$set").unwrap().len(), 2);
        assert_eq!(rendered.get_document("$inc").unwrap().len(), 1);
    }

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(Some(1000), Some(-5)), Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(None, Some(40)).limit, DEFAULT_PAGE_SIZE);
    }
}
