//! Domain types: work items, queries and templates

pub mod template;
pub mod work_item;

pub use template::{slugify, ChildSpec, Template, TemplateRelations};
pub use work_item::{
    FieldUpdate, NewWorkItem, PatchOp, QueryNode, Relation, WorkItem, WorkItemType,
};
