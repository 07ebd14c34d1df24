//! List and report view state.
//!
//! [`ListState`] keeps one text filter per standard-filter field plus
//! 1-based pagination. Any filter or page-size change resets to page 1.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::doc::DocDefinition;
use crate::schema::{normalize_fields, standard_filter_fields, Field};
use crate::types::value_as_text;

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Group key used when `list_report.group_by` is not authored.
pub const DEFAULT_GROUP_BY: &str = "group";

/// Group label for rows without a value for the group key.
pub const UNSPECIFIED_GROUP: &str = "Unspecified";

/// Columns shown in the builder's list preview.
pub const LIST_PREVIEW_COLUMNS: usize = 8;

// ---------------------------------------------------------------------------
// ListState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListState {
    filters: BTreeMap<String, String>,
    page: usize,
    /// Rows per page; `0` shows every row on one page.
    page_size: usize,
}

impl ListState {
    /// One empty filter per standard-filter field.
    pub fn new(fields: &[Field]) -> Self {
        let filters = standard_filter_fields(fields)
            .into_iter()
            .filter_map(|f| f.key().map(|k| (k.to_string(), String::new())))
            .collect();
        Self {
            filters,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Set a filter value and go back to page 1.
    ///
    /// Only keys of standard-filter fields are accepted; returns `false`
    /// for any other key.
    pub fn set_filter(&mut self, fieldname: &str, value: impl Into<String>) -> bool {
        match self.filters.get_mut(fieldname) {
            Some(slot) => {
                *slot = value.into();
                self.page = 1;
                true
            }
            None => false,
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.values_mut().for_each(String::clear);
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
        self.page = 1;
    }

    /// Move to `page`, clamped to `1..=total_pages(total_rows)`.
    pub fn set_page(&mut self, page: usize, total_rows: usize) {
        self.page = page.clamp(1, total_pages(total_rows, self.page_size));
    }

    /// Rows matching every non-empty filter.
    pub fn apply<'a>(&self, rows: &'a [Value]) -> Vec<&'a Value> {
        filter_rows(rows, &self.filters)
    }

    /// The current page of `rows` after filtering.
    pub fn visible_rows<'a>(&self, rows: &'a [Value]) -> Vec<&'a Value> {
        paginate(&self.apply(rows), self.page, self.page_size)
    }
}

/// Case-insensitive substring match of every non-empty filter.
pub fn filter_rows<'a>(rows: &'a [Value], filters: &BTreeMap<String, String>) -> Vec<&'a Value> {
    let needles: Vec<(&String, String)> = filters
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k, v.trim().to_lowercase()))
        .collect();

    rows.iter()
        .filter(|row| {
            needles.iter().all(|(key, needle)| {
                let cell = row.get(key.as_str()).map(value_as_text).unwrap_or_default();
                cell.to_lowercase().contains(needle.as_str())
            })
        })
        .collect()
}

/// `max(1, ceil(total / page_size))`; one page when `page_size` is 0.
pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total_rows.div_ceil(page_size).max(1)
}

/// Slice out a 1-based page. `page_size == 0` returns everything.
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> Vec<T> {
    if page_size == 0 {
        return rows.to_vec();
    }
    let start = page.saturating_sub(1).saturating_mul(page_size);
    rows.iter().skip(start).take(page_size).cloned().collect()
}

/// Pull a row list out of a loosely shaped list response: a top-level
/// array, a `data` array or a `results` array. Anything else is empty.
pub fn unwrap_rows(payload: &Value) -> Vec<Value> {
    payload
        .as_array()
        .or_else(|| payload.get("data").and_then(Value::as_array))
        .or_else(|| payload.get("results").and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

/// Count rows per value of `group_by`, largest group first.
///
/// Ties keep first-seen order. Each output row is
/// `{id: "report-<n>", <group_by>: <value>, count: <n>}`.
pub fn build_report_rows(rows: &[Value], group_by: Option<&str>) -> Vec<Value> {
    let key = group_by.filter(|g| !g.is_empty()).unwrap_or(DEFAULT_GROUP_BY);
    let mut groups: Vec<(String, usize)> = Vec::new();
    for row in rows {
        let group = row
            .get(key)
            .filter(|v| !v.is_null())
            .map(value_as_text)
            .unwrap_or_else(|| UNSPECIFIED_GROUP.to_string());
        match groups.iter_mut().find(|(g, _)| *g == group) {
            Some((_, count)) => *count += 1,
            None => groups.push((group, 1)),
        }
    }

    let mut out: Vec<Value> = groups
        .into_iter()
        .enumerate()
        .map(|(index, (group, count))| {
            let mut row = serde_json::Map::new();
            row.insert("id".into(), json!(format!("report-{}", index + 1)));
            row.insert(key.to_string(), json!(group));
            row.insert("count".into(), json!(count));
            Value::Object(row)
        })
        .collect();
    out.sort_by_key(|row| std::cmp::Reverse(row["count"].as_u64().unwrap_or(0)));
    out
}

// ---------------------------------------------------------------------------
// Table configs
// ---------------------------------------------------------------------------

/// Column/settings description consumed by list and report tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableConfig {
    pub name: String,
    pub title: String,
    pub is_list: bool,
    pub quick_entry: bool,
    pub customize: bool,
    pub fields: Vec<Field>,
    pub settings: Value,
}

fn column(fieldname: &str, label: &str, fieldtype: &str, filter: bool) -> Field {
    let mut field = Field::new(fieldname);
    field.label = Some(label.to_string());
    field.fieldtype = Some(fieldtype.to_string());
    field.in_list_view = true;
    field.in_standard_filter = filter;
    field
}

fn doc_title(doc: &Value, doc_key: &str) -> String {
    DocDefinition::new(doc)
        .title()
        .unwrap_or(doc_key)
        .to_string()
}

/// List table for a doc: every schema field, settings from `list_report`.
pub fn build_list_table_config(doc_key: &str, doc: &Value, fields: &[Field]) -> TableConfig {
    let title = doc_title(doc, doc_key);
    TableConfig {
        name: title.clone(),
        title,
        is_list: true,
        quick_entry: false,
        customize: false,
        fields: normalize_fields(fields),
        settings: doc
            .get("list_report")
            .cloned()
            .unwrap_or_else(|| json!({})),
    }
}

/// Report table: `id`, the group column and `count`.
pub fn build_report_table_config(doc_key: &str, doc: &Value, report_rows: usize) -> TableConfig {
    let title = format!("{} Report", doc_title(doc, doc_key));
    let group_by = DocDefinition::new(doc)
        .report_group_by()
        .unwrap_or(DEFAULT_GROUP_BY)
        .to_string();
    TableConfig {
        name: title.clone(),
        title,
        is_list: true,
        quick_entry: false,
        customize: false,
        fields: vec![
            column("id", "ID", "Data", false),
            column(&group_by, &format!("Group ({group_by})"), "Data", true),
            column("count", "Count", "Int", false),
        ],
        settings: json!({"report_mode": true, "source_count": report_rows}),
    }
}

/// Builder list preview: `id` plus the first eight non-break fields, and a
/// single sample row filled from the preview values.
pub fn list_preview(
    fields: &[Field],
    preview_values: &crate::types::FormRecord,
) -> (TableConfig, Value) {
    let mut columns = vec![column("id", "ID", "Data", false)];
    columns.extend(
        normalize_fields(fields)
            .iter()
            .filter(|f| !f.field_type().contains("Break"))
            .take(LIST_PREVIEW_COLUMNS)
            .map(|f| {
                column(
                    f.key().unwrap_or_default(),
                    f.display_label(),
                    f.field_type(),
                    false,
                )
            }),
    );

    let mut row = serde_json::Map::new();
    row.insert("id".into(), json!("sample-1"));
    for field in normalize_fields(fields) {
        let Some(key) = field.key() else { continue };
        let value = preview_values
            .get(key)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| field.default.clone().filter(|d| !d.is_null()))
            .unwrap_or_else(|| json!(""));
        row.insert(key.to_string(), value);
    }

    let config = TableConfig {
        name: "Doc Rows Preview".into(),
        title: "Doc Rows Preview".into(),
        is_list: true,
        quick_entry: false,
        customize: false,
        fields: columns,
        settings: json!({}),
    };
    (config, Value::Object(row))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
