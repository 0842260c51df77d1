//! Work item templates: the YAML shape stored on disk and its conversion to and from work items

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::work_item::{
    FieldUpdate, NewWorkItem, WorkItem, FIELD_ASSIGNED_TO, FIELD_DESCRIPTION, FIELD_TITLE,
};

/// Child created under the parent when a template is instantiated.
pub const DEFAULT_CHILD_TYPE: &str = "Task";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub work_item_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<TemplateRelations>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateRelations {
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChildSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub work_item_type: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "assignedTo", default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl Template {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Skeleton written by "new template".
    pub fn skeleton(name: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_TITLE.to_string(), Value::String(name.to_string()));
        fields.insert(FIELD_DESCRIPTION.to_string(), Value::String(String::new()));
        Self {
            name: name.to_string(),
            description: Some("Describe when to use this template".to_string()),
            work_item_type: "User Story".to_string(),
            fields,
            relations: None,
        }
    }

    /// Snapshot a work item, its parent link and its children.
    pub fn from_work_item(item: &WorkItem, parent: Option<&WorkItem>, children: &[WorkItem]) -> Self {
        let children: Vec<ChildSpec> = children.iter().map(ChildSpec::from_work_item).collect();
        let parent_id = parent.map(|p| p.id).or_else(|| item.parent_id());
        let relations = if parent_id.is_none() && children.is_empty() {
            None
        } else {
            Some(TemplateRelations {
                parent_id,
                children,
            })
        };

        Self {
            name: item.title().to_string(),
            description: Some(format!("Exported from #{}", item.id)),
            work_item_type: item.work_item_type().to_string(),
            fields: item.editable_fields(),
            relations,
        }
    }

    pub fn parent_id(&self) -> Option<u32> {
        self.relations.as_ref().and_then(|r| r.parent_id)
    }

    pub fn children(&self) -> &[ChildSpec] {
        self.relations
            .as_ref()
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    /// Request for the top-level item. The template name stands in for a missing title.
    pub fn to_new_work_item(&self) -> NewWorkItem {
        let mut fields = self.fields.clone();
        fields
            .entry(FIELD_TITLE.to_string())
            .or_insert_with(|| Value::String(self.name.clone()));
        NewWorkItem {
            work_item_type: self.work_item_type.clone(),
            fields,
            parent_id: self.parent_id(),
        }
    }

    /// Field-level patch turning `self` (the original snapshot) into `edited`.
    /// Only top-level fields are diffed.
    pub fn field_changes(&self, edited: &Template) -> Vec<FieldUpdate> {
        let mut changes = Vec::new();
        for (name, value) in &edited.fields {
            if self.fields.get(name) != Some(value) {
                changes.push(FieldUpdate::set(name, value.clone()));
            }
        }
        for name in self.fields.keys() {
            if !edited.fields.contains_key(name) {
                changes.push(FieldUpdate::remove(name));
            }
        }
        changes
    }
}

impl ChildSpec {
    pub fn from_work_item(item: &WorkItem) -> Self {
        let mut fields = item.editable_fields();
        fields.remove(FIELD_TITLE);
        let description = fields
            .remove(FIELD_DESCRIPTION)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());
        let assigned_to = fields.remove(FIELD_ASSIGNED_TO).and(item.assigned_to());
        Self {
            work_item_type: Some(item.work_item_type().to_string()).filter(|t| !t.is_empty()),
            title: item.title().to_string(),
            description,
            assigned_to,
            fields,
        }
    }

    pub fn to_new_work_item(&self, parent_id: u32) -> NewWorkItem {
        let mut fields = self.fields.clone();
        fields.insert(FIELD_TITLE.to_string(), Value::String(self.title.clone()));
        if let Some(description) = &self.description {
            fields.insert(
                FIELD_DESCRIPTION.to_string(),
                Value::String(description.clone()),
            );
        }
        if let Some(assigned_to) = &self.assigned_to {
            fields.insert(
                FIELD_ASSIGNED_TO.to_string(),
                Value::String(assigned_to.clone()),
            );
        }
        NewWorkItem {
            work_item_type: self
                .work_item_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CHILD_TYPE.to_string()),
            fields,
            parent_id: Some(parent_id),
        }
    }
}

/// File-name friendly form of a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "template".to_string()
    } else {
        slug.chars().take(60).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::work_item::{Relation, FIELD_STATE, FIELD_TAGS, FIELD_TYPE, REL_CHILD};
    use serde_json::json;

    fn story() -> WorkItem {
        let mut item = WorkItem {
            id: 42,
            rev: 3,
            relations: vec![Relation {
                rel: REL_CHILD.into(),
                url: "https://dev.azure.com/org/_apis/wit/workItems/43".into(),
            }],
            ..WorkItem::default()
        };
        item.fields.insert(FIELD_TITLE.into(), json!("Fix login bug"));
        item.fields.insert(FIELD_STATE.into(), json!("Active"));
        item.fields.insert(FIELD_TYPE.into(), json!("Bug"));
        item.fields.insert("System.Id".into(), json!(42));
        item
    }

    fn task() -> WorkItem {
        let mut item = WorkItem {
            id: 43,
            ..WorkItem::default()
        };
        item.fields.insert(FIELD_TITLE.into(), json!("Write regression test"));
        item.fields.insert(FIELD_TYPE.into(), json!("Task"));
        item.fields.insert(FIELD_DESCRIPTION.into(), json!("cover the redirect"));
        item
    }

    #[test]
    fn test_from_work_item_keeps_editable_fields() {
        let template = Template::from_work_item(&story(), None, &[task()]);
        assert_eq!(template.name, "Fix login bug");
        assert_eq!(template.work_item_type, "Bug");
        assert_eq!(template.fields.get(FIELD_STATE), Some(&json!("Active")));
        assert!(!template.fields.contains_key("System.Id"));
        assert!(!template.fields.contains_key(FIELD_TYPE));

        let children = template.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].title, "Write regression test");
        assert_eq!(children[0].description.as_deref(), Some("cover the redirect"));
        assert_eq!(children[0].work_item_type.as_deref(), Some("Task"));
    }

    #[test]
    fn test_yaml_uses_wire_names() {
        let template = Template::from_work_item(&story(), None, &[task()]);
        let yaml = template.to_yaml().expect("serialize");
        assert!(yaml.contains("type: Bug"));
        assert!(yaml.contains("relations:"));
        assert!(!yaml.contains("parentId"));

        let parsed = Template::from_yaml(&yaml).expect("parse");
        assert_eq!(parsed, template);
    }

    #[test]
    fn test_minimal_yaml_parses() {
        let raw = "name: Spike\ntype: Task\nrelations:\n  parentId: 7\n  children:\n    - title: Research\n";
        let template = Template::from_yaml(raw).expect("parse");
        assert!(template.fields.is_empty());
        assert_eq!(template.parent_id(), Some(7));

        let request = template.to_new_work_item();
        assert_eq!(request.fields.get(FIELD_TITLE), Some(&json!("Spike")));
        assert_eq!(request.parent_id, Some(7));

        let child = template.children()[0].to_new_work_item(99);
        assert_eq!(child.work_item_type, DEFAULT_CHILD_TYPE);
        assert_eq!(child.parent_id, Some(99));
    }

    #[test]
    fn test_field_changes_detects_set_and_remove() {
        let original = Template::from_work_item(&story(), None, &[]);
        let mut edited = original.clone();
        edited.fields.insert(FIELD_STATE.into(), json!("Resolved"));
        edited.fields.insert(FIELD_TAGS.into(), json!("ui"));
        edited.fields.remove(FIELD_TITLE);

        let changes = original.field_changes(&edited);
        assert_eq!(changes.len(), 3);
        assert!(changes.contains(&FieldUpdate::set(FIELD_STATE, "Resolved")));
        assert!(changes.contains(&FieldUpdate::set(FIELD_TAGS, "ui")));
        assert!(changes.contains(&FieldUpdate::remove(FIELD_TITLE)));
        assert!(original.field_changes(&original).is_empty());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fix login bug!"), "fix-login-bug");
        assert_eq!(slugify("  ***  "), "template");
    }
}
