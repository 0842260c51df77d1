//! Multi-call operations behind the dashboard's work item and template actions.
//!
//! Each function runs inside a task on the runtime and reports failures as
//! display strings, ready to go into a [`Message`](crate::core::Message).

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::{CreatedSummary, Services, UpdateOutcome, WorkItemDetail};
use crate::domain::work_item::{is_read_only_field, Relation, REL_CHILD, REL_PARENT};
use crate::domain::{FieldUpdate, Template, WorkItem};
use crate::infrastructure::api::WorkItemApi;

/// Work item plus one line per relation, titles resolved where possible.
pub async fn load_detail(api: &dyn WorkItemApi, id: u32) -> Result<WorkItemDetail, String> {
    let item = api.get_work_item(id).await.map_err(|e| e.to_string())?;
    let mut relations = Vec::with_capacity(item.relations.len());
    for relation in ordered_relations(&item) {
        relations.push(describe_relation(api, relation).await);
    }
    Ok(WorkItemDetail { item, relations })
}

fn ordered_relations(item: &WorkItem) -> Vec<&Relation> {
    let rank = |rel: &Relation| match rel.rel.as_str() {
        REL_PARENT => 0,
        REL_CHILD => 1,
        _ => 2,
    };
    let mut relations: Vec<&Relation> = item.relations.iter().collect();
    relations.sort_by_key(|rel| rank(rel));
    relations
}

async fn describe_relation(api: &dyn WorkItemApi, relation: &Relation) -> String {
    let label = relation.label();
    let is_work_item = relation.url.contains("/_apis/wit/workItems/");
    match relation.target_id().filter(|_| is_work_item) {
        Some(target) => match api.get_work_item(target).await {
            Ok(related) => format!(
                "{label:<11} #{target} {} [{}]",
                related.title(),
                related.state()
            ),
            Err(err) => {
                debug!(target, error = %err, "related work item lookup failed");
                format!("{label:<11} #{target}")
            }
        },
        None => format!("{label:<11} {}", relation.url),
    }
}

/// IDs of direct children, as the service reports them now.
pub async fn resolve_children(api: &dyn WorkItemApi, id: u32) -> Result<(WorkItem, Vec<u32>), String> {
    let item = api.get_work_item(id).await.map_err(|e| e.to_string())?;
    let children = item.child_ids();
    Ok((item, children))
}

/// Snapshot a work item with its parent link and children into the template store.
pub async fn download_template(services: &Services, id: u32) -> Result<PathBuf, String> {
    let api = services.api.as_ref();
    let item = api.get_work_item(id).await.map_err(|e| e.to_string())?;
    let parent = match item.parent_id() {
        Some(parent_id) => match api.get_work_item(parent_id).await {
            Ok(parent) => Some(parent),
            Err(err) => {
                warn!(parent_id, error = %err, "parent lookup failed, keeping link only");
                None
            }
        },
        None => None,
    };
    let mut children = Vec::new();
    for child_id in item.child_ids() {
        let child = api
            .get_work_item(child_id)
            .await
            .map_err(|e| format!("child #{child_id}: {e}"))?;
        children.push(child);
    }

    let template = Template::from_work_item(&item, parent.as_ref(), &children);
    let path = services
        .templates
        .save_unique(&template)
        .map_err(|e| e.to_string())?;
    info!(id, path = %path.display(), children = children.len(), "work item downloaded as template");
    Ok(path)
}

/// Create the template's work item, then each child under it.
pub async fn create_from_template(services: &Services, path: &Path) -> Result<CreatedSummary, String> {
    let template = services.templates.load(path).map_err(|e| e.to_string())?;
    if template.work_item_type.trim().is_empty() {
        return Err(format!("{}: missing work item type", path.display()));
    }
    let api = services.api.as_ref();
    api.get_work_item_type(&template.work_item_type)
        .await
        .map_err(|e| format!("work item type '{}': {e}", template.work_item_type))?;

    let created = api
        .create_work_item(&template.to_new_work_item())
        .await
        .map_err(|e| e.to_string())?;
    info!(id = created.id, template = %template.name, "work item created");

    let children = template.children();
    for (done, child) in children.iter().enumerate() {
        if let Err(err) = api.create_work_item(&child.to_new_work_item(created.id)).await {
            return Err(format!(
                "created #{} but child '{}' failed ({done} of {} children created): {err}",
                created.id,
                child.title,
                children.len()
            ));
        }
    }

    Ok(CreatedSummary {
        id: created.id,
        title: created.title().to_string(),
        children: children.len(),
    })
}

/// Delete every child, then the parent. The first failure stops the run before
/// the parent is touched.
pub async fn delete_with_children(api: &dyn WorkItemApi, id: u32, children: &[u32]) -> Result<usize, String> {
    for (done, child) in children.iter().enumerate() {
        if let Err(err) = api.delete_work_item(*child).await {
            warn!(id, child, error = %err, "child delete failed");
            return Err(format!(
                "deleting child #{child} failed ({done} of {} children removed, #{id} kept): {err}",
                children.len()
            ));
        }
    }
    api.delete_work_item(id).await.map_err(|e| e.to_string())?;
    info!(id, children = children.len(), "work item deleted");
    Ok(children.len() + 1)
}

pub fn edit_path(id: u32) -> PathBuf {
    std::env::temp_dir().join(format!("itemdeck-{}-{id}.yaml", std::process::id()))
}

/// Write the work item's editable fields to a temporary YAML file.
pub async fn prepare_edit(services: &Services, id: u32) -> Result<(PathBuf, Template), String> {
    let item = services
        .api
        .get_work_item(id)
        .await
        .map_err(|e| e.to_string())?;
    let mut template = Template::from_work_item(&item, None, &[]);
    template.relations = None;
    template.description = None;
    let path = edit_path(id);
    services
        .templates
        .write(&path, &template)
        .map_err(|e| e.to_string())?;
    Ok((path, template))
}

/// Diff the edited file against what was written out and send the changed fields.
pub async fn apply_edit(
    services: &Services,
    id: u32,
    path: &Path,
    original: &Template,
) -> Result<UpdateOutcome, String> {
    let edited = services.templates.load(path).map_err(|e| e.to_string());
    if let Err(err) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %err, "temp file not removed");
    }
    let edited = edited?;
    let changes: Vec<FieldUpdate> = original
        .field_changes(&edited)
        .into_iter()
        .filter(|change| !is_read_only_field(&change.field))
        .collect();
    update_fields(services.api.as_ref(), id, &changes).await
}

pub async fn update_fields(
    api: &dyn WorkItemApi,
    id: u32,
    changes: &[FieldUpdate],
) -> Result<UpdateOutcome, String> {
    if changes.is_empty() {
        return Ok(UpdateOutcome::Unchanged);
    }
    let updated = api
        .update_work_item(id, changes)
        .await
        .map_err(|e| e.to_string())?;
    info!(id, fields = changes.len(), "work item updated");
    Ok(UpdateOutcome::Updated {
        title: updated.title().to_string(),
    })
}

/// Current item and the states its type allows.
pub async fn allowed_states(api: &dyn WorkItemApi, id: u32) -> Result<(WorkItem, Vec<String>), String> {
    let item = api.get_work_item(id).await.map_err(|e| e.to_string())?;
    let states = api
        .list_work_item_states(item.work_item_type())
        .await
        .map_err(|e| e.to_string())?;
    if states.is_empty() {
        return Err(format!("no states defined for '{}'", item.work_item_type()));
    }
    Ok((item, states))
}
