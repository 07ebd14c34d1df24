//! Form layout: tabs, sections and columns built from break pseudo-fields.
//!
//! Every level carries its own compiled [`DependsOn`]. Visibility is decided
//! per level against the same record; a hidden tab or section does not
//! change how the expressions below it evaluate.

use serde::Serialize;

use crate::expression::DependsOn;
use crate::schema::{normalize_fields, BreakKind, Field};
use crate::types::FormRecord;

/// Label of the implicit first tab when the schema opens without a tab break.
pub const DEFAULT_TAB_LABEL: &str = "Details";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNode {
    pub field: Field,
    #[serde(skip)]
    pub depends_on: DependsOn,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ColumnNode {
    pub label: Option<String>,
    #[serde(skip)]
    pub depends_on: DependsOn,
    pub fields: Vec<FieldNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SectionNode {
    pub label: Option<String>,
    #[serde(skip)]
    pub depends_on: DependsOn,
    pub columns: Vec<ColumnNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TabNode {
    pub label: Option<String>,
    #[serde(skip)]
    pub depends_on: DependsOn,
    pub sections: Vec<SectionNode>,
}

/// The grouped, compiled layout of a schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormLayout {
    pub tabs: Vec<TabNode>,
}

fn group_label(field: &Field) -> Option<String> {
    field.label.clone().filter(|l| !l.is_empty())
}

fn condition(field: &Field) -> DependsOn {
    DependsOn::compile(field.depends_on.as_deref())
}

impl SectionNode {
    fn current_column(&mut self) -> &mut ColumnNode {
        if self.columns.is_empty() {
            self.columns.push(ColumnNode::default());
        }
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }
}

impl TabNode {
    fn current_section(&mut self) -> &mut SectionNode {
        if self.sections.is_empty() {
            self.sections.push(SectionNode::default());
        }
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }
}

impl FormLayout {
    /// Group fields at `Tab Break` / `Section Break` / `Column Break`.
    ///
    /// Hidden fields and non-break pseudo-fields are left out; groups that
    /// end up with no fields are dropped.
    pub fn build(fields: &[Field]) -> Self {
        let mut tabs = vec![TabNode {
            label: Some(DEFAULT_TAB_LABEL.to_string()),
            ..TabNode::default()
        }];

        for field in normalize_fields(fields) {
            if field.break_kind() == Some(BreakKind::Tab) {
                tabs.push(TabNode {
                    label: group_label(&field),
                    depends_on: condition(&field),
                    sections: Vec::new(),
                });
                continue;
            }
            let Some(tab) = tabs.last_mut() else { break };
            match field.break_kind() {
                Some(BreakKind::Section) => tab.sections.push(SectionNode {
                    label: group_label(&field),
                    depends_on: condition(&field),
                    columns: Vec::new(),
                }),
                Some(BreakKind::Column) => tab.current_section().columns.push(ColumnNode {
                    label: group_label(&field),
                    depends_on: condition(&field),
                    fields: Vec::new(),
                }),
                _ if field.is_renderable() => {
                    let depends_on = condition(&field);
                    tab.current_section()
                        .current_column()
                        .fields
                        .push(FieldNode { field, depends_on });
                }
                _ => {}
            }
        }

        for tab in &mut tabs {
            for section in &mut tab.sections {
                section.columns.retain(|c| !c.fields.is_empty());
            }
            tab.sections.retain(|s| !s.columns.is_empty());
        }
        tabs.retain(|t| !t.sections.is_empty());

        Self { tabs }
    }

    /// Copy of the layout with every hidden tab, section, column and field
    /// removed.
    pub fn visible(&self, record: Option<&FormRecord>) -> Self {
        let tabs = self
            .tabs
            .iter()
            .filter(|t| t.depends_on.is_visible(record))
            .map(|t| TabNode {
                sections: t
                    .sections
                    .iter()
                    .filter(|s| s.depends_on.is_visible(record))
                    .map(|s| SectionNode {
                        columns: s
                            .columns
                            .iter()
                            .filter(|c| c.depends_on.is_visible(record))
                            .map(|c| ColumnNode {
                                fields: c
                                    .fields
                                    .iter()
                                    .filter(|f| f.depends_on.is_visible(record))
                                    .cloned()
                                    .collect(),
                                ..c.clone()
                            })
                            .collect(),
                        ..s.clone()
                    })
                    .collect(),
                ..t.clone()
            })
            .collect();
        Self { tabs }
    }

    /// Fieldnames whose own `depends_on` hides them, regardless of the
    /// visibility of their enclosing groups.
    pub fn hidden_fieldnames(&self, record: Option<&FormRecord>) -> Vec<String> {
        self.field_nodes()
            .filter(|node| !node.depends_on.is_visible(record))
            .filter_map(|node| node.field.key().map(str::to_string))
            .collect()
    }

    /// Every field node, in layout order.
    pub fn field_nodes(&self) -> impl Iterator<Item = &FieldNode> {
        self.tabs
            .iter()
            .flat_map(|t| &t.sections)
            .flat_map(|s| &s.columns)
            .flat_map(|c| &c.fields)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::Schema;

    fn fields(value: serde_json::Value) -> Vec<Field> {
        Schema::from_value(&json!({ "fields": value })).fields
    }

    fn record(value: serde_json::Value) -> FormRecord {
        value.as_object().cloned().unwrap()
    }

    fn keys(layout: &FormLayout) -> Vec<String> {
        layout
            .field_nodes()
            .filter_map(|n| n.field.key().map(str::to_string))
            .collect()
    }

    #[test]
    fn groups_fields_at_breaks() {
        let layout = FormLayout::build(&fields(json!([
            {"fieldname": "title"},
            {"fieldname": "s1", "fieldtype": "Section Break", "label": "Amounts"},
            {"fieldname": "net"},
            {"fieldname": "c1", "fieldtype": "Column Break"},
            {"fieldname": "tax"},
            {"fieldname": "t2", "fieldtype": "Tab Break", "label": "More"},
            {"fieldname": "notes"},
        ])));

        assert_eq!(layout.tabs.len(), 2);
        assert_eq!(layout.tabs[0].label.as_deref(), Some(DEFAULT_TAB_LABEL));
        assert_eq!(layout.tabs[0].sections.len(), 2);
        assert_eq!(layout.tabs[0].sections[1].label.as_deref(), Some("Amounts"));
        assert_eq!(layout.tabs[0].sections[1].columns.len(), 2);
        assert_eq!(layout.tabs[1].label.as_deref(), Some("More"));
        assert_eq!(keys(&layout), vec!["title", "net", "tax", "notes"]);
    }

    #[test]
    fn empty_groups_are_dropped() {
        let layout = FormLayout::build(&fields(json!([
            {"fieldname": "t1", "fieldtype": "Tab Break"},
            {"fieldname": "s1", "fieldtype": "Section Break"},
            {"fieldname": "a"},
        ])));
        assert_eq!(layout.tabs.len(), 1);
        assert_eq!(layout.tabs[0].sections.len(), 1);
    }

    #[test]
    fn field_level_visibility_scenario() {
        let layout = FormLayout::build(&fields(json!([
            {"fieldname": "status"},
            {"fieldname": "total", "depends_on": "status != 'draft'"},
        ])));

        let draft = record(json!({"status": "draft"}));
        assert_eq!(keys(&layout.visible(Some(&draft))), vec!["status"]);
        assert_eq!(layout.hidden_fieldnames(Some(&draft)), vec!["total"]);

        let approved = record(json!({"status": "approved"}));
        assert_eq!(keys(&layout.visible(Some(&approved))), vec!["status", "total"]);
    }

    #[test]
    fn each_level_evaluates_its_own_expression() {
        let layout = FormLayout::build(&fields(json!([
            {"fieldname": "status"},
            {"fieldname": "s1", "fieldtype": "Section Break", "depends_on": "status == 'approved'"},
            {"fieldname": "approved_by"},
        ])));
        let draft = record(json!({"status": "draft"}));

        // The section is pruned, but its field carries no expression of its own.
        assert_eq!(keys(&layout.visible(Some(&draft))), vec!["status"]);
        assert!(layout.hidden_fieldnames(Some(&draft)).is_empty());
    }

    #[test]
    fn unloaded_record_shows_everything() {
        let layout = FormLayout::build(&fields(json!([
            {"fieldname": "t", "fieldtype": "Tab Break", "depends_on": "x == 'y'"},
            {"fieldname": "a", "depends_on": "x == 'y'"},
        ])));
        assert_eq!(keys(&layout.visible(None)), vec!["a"]);
    }

    #[test]
    fn column_visibility() {
        let layout = FormLayout::build(&fields(json!([
            {"fieldname": "kind"},
            {"fieldname": "c", "fieldtype": "Column Break", "depends_on": "kind == 'b2b'"},
            {"fieldname": "vat_id"},
        ])));
        let b2c = record(json!({"kind": "b2c"}));
        assert_eq!(keys(&layout.visible(Some(&b2c))), vec!["kind"]);
        let b2b = record(json!({"kind": "b2b"}));
        assert_eq!(keys(&layout.visible(Some(&b2b))), vec!["kind", "vat_id"]);
    }
}
