//! Work item and query types shared by the API client, tabs and templates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub const FIELD_TITLE: &str = "System.Title";
pub const FIELD_STATE: &str = "System.State";
pub const FIELD_TYPE: &str = "System.WorkItemType";
pub const FIELD_ASSIGNED_TO: &str = "System.AssignedTo";
pub const FIELD_TAGS: &str = "System.Tags";
pub const FIELD_DESCRIPTION: &str = "System.Description";
pub const FIELD_AREA_PATH: &str = "System.AreaPath";
pub const FIELD_ITERATION_PATH: &str = "System.IterationPath";
pub const FIELD_CHANGED_DATE: &str = "System.ChangedDate";

pub const REL_PARENT: &str = "System.LinkTypes.Hierarchy-Reverse";
pub const REL_CHILD: &str = "System.LinkTypes.Hierarchy-Forward";

/// Fields maintained by the service that must never be written back.
pub const READ_ONLY_FIELDS: &[&str] = &[
    "System.Id",
    "System.Rev",
    "System.Watermark",
    "System.WorkItemType",
    "System.TeamProject",
    "System.CreatedDate",
    "System.CreatedBy",
    "System.ChangedDate",
    "System.ChangedBy",
    "System.AuthorizedDate",
    "System.AuthorizedAs",
    "System.RevisedDate",
    "System.AreaId",
    "System.IterationId",
    "System.NodeName",
    "System.AreaLevel1",
    "System.IterationLevel1",
    "System.Parent",
    "System.CommentCount",
    "System.BoardColumn",
    "System.BoardColumnDone",
    "System.PersonId",
    "System.Reason",
    "Microsoft.VSTS.Common.StateChangeDate",
    "Microsoft.VSTS.Common.ActivatedDate",
    "Microsoft.VSTS.Common.ActivatedBy",
    "Microsoft.VSTS.Common.ClosedDate",
    "Microsoft.VSTS.Common.ClosedBy",
    "Microsoft.VSTS.Common.ResolvedDate",
    "Microsoft.VSTS.Common.ResolvedBy",
];

pub fn is_read_only_field(name: &str) -> bool {
    READ_ONLY_FIELDS.contains(&name) || name.starts_with("WEF_")
}

/// A link from one work item to another
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub rel: String,
    pub url: String,
}

impl Relation {
    /// Target work item ID, taken from the last URL segment.
    pub fn target_id(&self) -> Option<u32> {
        id_from_url(&self.url)
    }

    pub fn label(&self) -> &str {
        match self.rel.as_str() {
            REL_PARENT => "Parent",
            REL_CHILD => "Child",
            "System.LinkTypes.Related" => "Related",
            "System.LinkTypes.Dependency-Forward" => "Successor",
            "System.LinkTypes.Dependency-Reverse" => "Predecessor",
            "ArtifactLink" => "Artifact",
            "Hyperlink" => "Link",
            other => other.rsplit('.').next().unwrap_or(other),
        }
    }
}

pub fn id_from_url(url: &str) -> Option<u32> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkItem {
    pub id: u32,
    pub rev: u32,
    pub fields: BTreeMap<String, Value>,
    pub relations: Vec<Relation>,
    pub url: String,
}

impl WorkItem {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn title(&self) -> &str {
        self.field_str(FIELD_TITLE).unwrap_or("")
    }

    pub fn state(&self) -> &str {
        self.field_str(FIELD_STATE).unwrap_or("")
    }

    pub fn work_item_type(&self) -> &str {
        self.field_str(FIELD_TYPE).unwrap_or("")
    }

    /// Identity fields come back as objects; templates and prompts use the unique name.
    pub fn assigned_to(&self) -> Option<String> {
        self.fields.get(FIELD_ASSIGNED_TO).and_then(identity_name)
    }

    pub fn assigned_display(&self) -> Option<String> {
        match self.fields.get(FIELD_ASSIGNED_TO)? {
            Value::Object(map) => map
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn tags(&self) -> Vec<String> {
        self.field_str(FIELD_TAGS).map(split_tags).unwrap_or_default()
    }

    pub fn changed_at(&self) -> Option<DateTime<Utc>> {
        self.field_str(FIELD_CHANGED_DATE)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn parent_id(&self) -> Option<u32> {
        self.relations
            .iter()
            .find(|rel| rel.rel == REL_PARENT)
            .and_then(Relation::target_id)
    }

    pub fn child_ids(&self) -> Vec<u32> {
        self.relations
            .iter()
            .filter(|rel| rel.rel == REL_CHILD)
            .filter_map(Relation::target_id)
            .collect()
    }

    /// Fields that can be written back through create/update.
    pub fn editable_fields(&self) -> BTreeMap<String, Value> {
        self.fields
            .iter()
            .filter(|(name, _)| !is_read_only_field(name))
            .map(|(name, value)| {
                let value = identity_name(value)
                    .filter(|_| value.is_object())
                    .map(Value::String)
                    .unwrap_or_else(|| value.clone());
                (name.clone(), value)
            })
            .collect()
    }
}

fn identity_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("uniqueName")
            .or_else(|| map.get("displayName"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Merge new comma/semicolon separated tags into an existing set, keeping order and
/// skipping case-insensitive duplicates.
pub fn merge_tags(existing: &[String], input: &str) -> String {
    let mut tags: Vec<String> = existing.to_vec();
    for tag in input.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    }
    tags.join("; ")
}

/// Work item type metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkItemType {
    pub name: String,
    pub description: String,
    pub states: Vec<String>,
}

/// Query hierarchy node. Folders carry children; leaves are runnable queries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryNode {
    pub id: String,
    pub name: String,
    pub path: String,
    pub is_folder: bool,
    pub children: Vec<QueryNode>,
}

impl QueryNode {
    pub fn folder(name: &str, path: &str, children: Vec<QueryNode>) -> Self {
        Self {
            id: path.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            is_folder: true,
            children,
        }
    }

    pub fn query(id: &str, name: &str, path: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            is_folder: false,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }
}

/// A single-field change sent with update_work_item
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub op: PatchOp,
    pub field: String,
    pub value: Value,
}

impl FieldUpdate {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn remove(field: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            field: field.to_string(),
            value: Value::Null,
        }
    }
}

/// Payload for create_work_item
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewWorkItem {
    pub work_item_type: String,
    pub fields: BTreeMap<String, Value>,
    pub parent_id: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_with_relations() -> WorkItem {
        WorkItem {
            id: 10,
            relations: vec![
                Relation {
                    rel: REL_PARENT.into(),
                    url: "https://dev.azure.com/org/_apis/wit/workItems/3".into(),
                },
                Relation {
                    rel: REL_CHILD.into(),
                    url: "https://dev.azure.com/org/_apis/wit/workItems/11".into(),
                },
                Relation {
                    rel: REL_CHILD.into(),
                    url: "https://dev.azure.com/org/_apis/wit/workItems/12".into(),
                },
                Relation {
                    rel: "Hyperlink".into(),
                    url: "https://example.com/design-doc".into(),
                },
            ],
            ..WorkItem::default()
        }
    }

    #[test]
    fn test_parent_and_children_from_relations() {
        let item = item_with_relations();
        assert_eq!(item.parent_id(), Some(3));
        assert_eq!(item.child_ids(), vec![11, 12]);
    }

    #[test]
    fn test_identity_fields_flatten_to_unique_name() {
        let mut item = WorkItem::default();
        item.fields.insert(
            FIELD_ASSIGNED_TO.into(),
            json!({"displayName": "Ada Lovelace", "uniqueName": "ada@example.com"}),
        );
        item.fields.insert(FIELD_TITLE.into(), json!("Fix login bug"));
        item.fields.insert("System.Rev".into(), json!(4));

        assert_eq!(item.assigned_to().as_deref(), Some("ada@example.com"));
        assert_eq!(item.assigned_display().as_deref(), Some("Ada Lovelace"));

        let editable = item.editable_fields();
        assert_eq!(editable.get(FIELD_ASSIGNED_TO), Some(&json!("ada@example.com")));
        assert!(!editable.contains_key("System.Rev"));
    }

    #[test]
    fn test_merge_tags_skips_duplicates() {
        let existing = vec!["backend".to_string(), "urgent".to_string()];
        assert_eq!(
            merge_tags(&existing, "Urgent, ui;  api"),
            "backend; urgent; ui; api"
        );
        assert_eq!(merge_tags(&[], ""), "");
    }
}
