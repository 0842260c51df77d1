//! In-memory work item service shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use itemdeck::core::Services;
use itemdeck::domain::work_item::{
    Relation, FIELD_STATE, FIELD_TITLE, FIELD_TYPE, REL_CHILD, REL_PARENT,
};
use itemdeck::domain::{FieldUpdate, NewWorkItem, QueryNode, WorkItem, WorkItemType};
use itemdeck::infrastructure::api::{ApiError, ApiResult, WorkItemApi};
use itemdeck::store::TemplateStore;

const URL_BASE: &str = "https://dev.azure.com/contoso/_apis/wit/workItems";

#[derive(Default)]
struct State {
    items: BTreeMap<u32, WorkItem>,
    next_id: u32,
    calls: Vec<String>,
    failing_deletes: BTreeSet<u32>,
    types: BTreeMap<String, Vec<String>>,
    queries: Vec<QueryNode>,
}

/// Records every call as `"<method> <arg>"`.
#[derive(Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<State>>,
}

pub fn work_item(id: u32, title: &str, state: &str, kind: &str) -> WorkItem {
    let mut item = WorkItem {
        id,
        rev: 1,
        url: format!("{URL_BASE}/{id}"),
        ..WorkItem::default()
    };
    item.fields.insert(FIELD_TITLE.into(), json!(title));
    item.fields.insert(FIELD_STATE.into(), json!(state));
    item.fields.insert(FIELD_TYPE.into(), json!(kind));
    item
}

fn link(rel: &str, id: u32) -> Relation {
    Relation {
        rel: rel.to_string(),
        url: format!("{URL_BASE}/{id}"),
    }
}

impl MockApi {
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut state = api.lock();
            state.next_id = 1000;
            for kind in ["Epic", "User Story", "Bug", "Task"] {
                state.types.insert(
                    kind.to_string(),
                    vec!["New".into(), "Active".into(), "Closed".into()],
                );
            }
        }
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert(&self, item: WorkItem) {
        self.lock().items.insert(item.id, item);
    }

    /// Link `child` under `parent` on both sides.
    pub fn link(&self, parent: u32, child: u32) {
        let mut state = self.lock();
        if let Some(item) = state.items.get_mut(&parent) {
            item.relations.push(link(REL_CHILD, child));
        }
        if let Some(item) = state.items.get_mut(&child) {
            item.relations.push(link(REL_PARENT, parent));
        }
    }

    pub fn fail_delete(&self, id: u32) {
        self.lock().failing_deletes.insert(id);
    }

    pub fn set_queries(&self, queries: Vec<QueryNode>) {
        self.lock().queries = queries;
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(method))
            .collect()
    }

    pub fn item(&self, id: u32) -> Option<WorkItem> {
        self.lock().items.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.lock().items.keys().copied().collect()
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl WorkItemApi for MockApi {
    async fn list_queries(&self) -> ApiResult<Vec<QueryNode>> {
        self.record("list_queries".into());
        Ok(self.lock().queries.clone())
    }

    async fn execute_query(&self, query_id: &str) -> ApiResult<Vec<WorkItem>> {
        self.record(format!("execute_query {query_id}"));
        Ok(self.lock().items.values().cloned().collect())
    }

    async fn get_work_item(&self, id: u32) -> ApiResult<WorkItem> {
        self.record(format!("get_work_item {id}"));
        self.item(id).ok_or(ApiError::NotFound(id))
    }

    async fn create_work_item(&self, new: &NewWorkItem) -> ApiResult<WorkItem> {
        self.record(format!("create_work_item {}", new.work_item_type));
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            state.next_id
        };
        let mut item = WorkItem {
            id,
            rev: 1,
            fields: new.fields.clone(),
            url: format!("{URL_BASE}/{id}"),
            ..WorkItem::default()
        };
        item.fields
            .insert(FIELD_TYPE.into(), Value::String(new.work_item_type.clone()));
        self.insert(item);
        if let Some(parent) = new.parent_id {
            self.link(parent, id);
        }
        self.item(id).ok_or(ApiError::NotFound(id))
    }

    async fn update_work_item(&self, id: u32, updates: &[FieldUpdate]) -> ApiResult<WorkItem> {
        self.record(format!("update_work_item {id}"));
        let mut state = self.lock();
        let item = state.items.get_mut(&id).ok_or(ApiError::NotFound(id))?;
        for update in updates {
            if update.value.is_null() {
                item.fields.remove(&update.field);
            } else {
                item.fields.insert(update.field.clone(), update.value.clone());
            }
        }
        item.rev += 1;
        Ok(item.clone())
    }

    async fn delete_work_item(&self, id: u32) -> ApiResult<()> {
        self.record(format!("delete_work_item {id}"));
        let mut state = self.lock();
        if state.failing_deletes.contains(&id) {
            return Err(ApiError::Status {
                status: 403,
                message: format!("not allowed to delete #{id}"),
            });
        }
        state
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or(ApiError::NotFound(id))
    }

    async fn list_work_item_states(&self, work_item_type: &str) -> ApiResult<Vec<String>> {
        self.record(format!("list_work_item_states {work_item_type}"));
        Ok(self
            .lock()
            .types
            .get(work_item_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_work_item_type(&self, name: &str) -> ApiResult<WorkItemType> {
        self.record(format!("get_work_item_type {name}"));
        let states = self.lock().types.get(name).cloned().ok_or_else(|| ApiError::Status {
            status: 404,
            message: format!("unknown type {name}"),
        })?;
        Ok(WorkItemType {
            name: name.to_string(),
            description: String::new(),
            states,
        })
    }
}

pub fn services(api: &MockApi, templates: &std::path::Path) -> Services {
    Services {
        api: Arc::new(api.clone()),
        templates: TemplateStore::new(templates),
    }
}
