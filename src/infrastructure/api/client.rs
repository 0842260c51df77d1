//! Azure DevOps style REST client for work items

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ApiError, ApiResult, WorkItemApi};
use crate::domain::work_item::REL_PARENT;
use crate::domain::{FieldUpdate, NewWorkItem, QueryNode, Relation, WorkItem, WorkItemType};

const API_VERSION: &str = "7.1";
/// Upper bound the service accepts for `workitems?ids=`
const BATCH_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Organization URL, e.g. https://dev.azure.com/contoso
    pub organization: String,
    pub project: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuery {
    id: String,
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    is_folder: bool,
    #[serde(default)]
    has_children: bool,
    #[serde(default)]
    children: Vec<RawQuery>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResult {
    #[serde(default)]
    work_items: Vec<WiqlRef>,
    #[serde(default)]
    work_item_relations: Vec<WiqlLink>,
}

#[derive(Debug, Deserialize)]
struct WiqlRef {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct WiqlLink {
    #[serde(default)]
    source: Option<WiqlRef>,
    target: WiqlRef,
}

#[derive(Debug, Deserialize)]
struct RawWorkItem {
    id: u32,
    #[serde(default)]
    rev: u32,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    relations: Vec<RawRelation>,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    rel: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawState {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawWorkItemType {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    states: Vec<RawState>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    message: String,
}

impl From<RawWorkItem> for WorkItem {
    fn from(raw: RawWorkItem) -> Self {
        WorkItem {
            id: raw.id,
            rev: raw.rev,
            fields: raw.fields,
            relations: raw
                .relations
                .into_iter()
                .map(|r| Relation {
                    rel: r.rel,
                    url: r.url,
                })
                .collect(),
            url: raw.url,
        }
    }
}

impl From<RawQuery> for QueryNode {
    fn from(raw: RawQuery) -> Self {
        QueryNode {
            id: raw.id,
            name: raw.name,
            path: raw.path,
            is_folder: raw.is_folder,
            children: raw.children.into_iter().map(QueryNode::from).collect(),
        }
    }
}

/// HTTP implementation of [`WorkItemApi`]
pub struct AzureDevOpsClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl AzureDevOpsClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        if config.organization.trim().is_empty() {
            return Err(ApiError::NotConfigured("organization URL".into()));
        }
        if config.project.trim().is_empty() {
            return Err(ApiError::NotConfigured("project".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("itemdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn project_url(&self, rest: &str) -> String {
        format!(
            "{}/{}/_apis/{}",
            self.config.organization.trim_end_matches('/'),
            self.config.project,
            rest
        )
    }

    fn work_item_url(&self, id: u32) -> String {
        format!(
            "{}/_apis/wit/workItems/{}",
            self.config.organization.trim_end_matches('/'),
            id
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let separator = if url.contains('?') { '&' } else { '?' };
        let url = format!("{url}{separator}api-version={API_VERSION}");
        debug!(%method, %url, "work item request");
        let builder = self.http.request(method, url).header(ACCEPT, "application/json");
        match &self.config.token {
            Some(token) => builder.basic_auth("", Some(token)),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServiceError>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = Self::send(self.request(Method::GET, url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn patch_json(&self, method: Method, url: &str, ops: Vec<Value>) -> ApiResult<WorkItem> {
        let body =
            serde_json::to_string(&ops).map_err(|err| ApiError::Decode(err.to_string()))?;
        let builder = self
            .request(method, url)
            .header(CONTENT_TYPE, "application/json-patch+json")
            .body(body);
        let raw: RawWorkItem = Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(raw.into())
    }

    /// Folders deeper than the initial `$depth` come back without children.
    fn expand_query<'a>(&'a self, raw: RawQuery) -> BoxFuture<'a, ApiResult<QueryNode>> {
        async move {
            let mut raw = raw;
            if raw.is_folder && raw.has_children && raw.children.is_empty() {
                let url = self.project_url(&format!("wit/queries/{}?$depth=2", raw.id));
                let full: RawQuery = self.get_json(&url).await?;
                raw.children = full.children;
            }
            let mut children = Vec::with_capacity(raw.children.len());
            for child in std::mem::take(&mut raw.children) {
                children.push(self.expand_query(child).await?);
            }
            let mut node = QueryNode::from(raw);
            node.children = children;
            Ok(node)
        }
        .boxed()
    }

    async fn fetch_batch(&self, ids: &[u32]) -> ApiResult<Vec<WorkItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_SIZE) {
            let joined = chunk
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let url = self.project_url(&format!("wit/workitems?ids={joined}"));
            let batch: ValueList<RawWorkItem> = self.get_json(&url).await?;
            items.extend(batch.value.into_iter().map(WorkItem::from));
        }
        Ok(items)
    }
}

fn field_ops(fields: &BTreeMap<String, Value>) -> Vec<Value> {
    fields
        .iter()
        .map(|(name, value)| json!({"op": "add", "path": format!("/fields/{name}"), "value": value}))
        .collect()
}

/// IDs referenced by a WIQL result, in result order, without duplicates.
fn wiql_ids(result: &WiqlResult) -> Vec<u32> {
    let mut seen = std::collections::HashSet::new();
    let flat = result.work_items.iter().map(|r| r.id);
    let linked = result
        .work_item_relations
        .iter()
        .flat_map(|link| link.source.iter().map(|s| s.id).chain([link.target.id]));
    flat.chain(linked).filter(|id| seen.insert(*id)).collect()
}

#[async_trait::async_trait]
impl WorkItemApi for AzureDevOpsClient {
    async fn list_queries(&self) -> ApiResult<Vec<QueryNode>> {
        let url = self.project_url("wit/queries?$depth=2");
        let roots: ValueList<RawQuery> = self.get_json(&url).await?;
        let mut nodes = Vec::with_capacity(roots.value.len());
        for raw in roots.value {
            nodes.push(self.expand_query(raw).await?);
        }
        Ok(nodes)
    }

    async fn execute_query(&self, query_id: &str) -> ApiResult<Vec<WorkItem>> {
        let url = self.project_url(&format!("wit/wiql/{query_id}"));
        let result: WiqlResult = self.get_json(&url).await?;
        let ids = wiql_ids(&result);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = self.fetch_batch(&ids).await?;
        let mut by_id: HashMap<u32, WorkItem> =
            fetched.into_iter().map(|item| (item.id, item)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_work_item(&self, id: u32) -> ApiResult<WorkItem> {
        let url = self.project_url(&format!("wit/workitems/{id}?$expand=relations"));
        match self.get_json::<RawWorkItem>(&url).await {
            Ok(raw) => Ok(raw.into()),
            Err(ApiError::Status { status: 404, .. }) => Err(ApiError::NotFound(id)),
            Err(err) => Err(err),
        }
    }

    async fn create_work_item(&self, item: &NewWorkItem) -> ApiResult<WorkItem> {
        let mut ops = field_ops(&item.fields);
        if let Some(parent) = item.parent_id {
            ops.push(json!({
                "op": "add",
                "path": "/relations/-",
                "value": {"rel": REL_PARENT, "url": self.work_item_url(parent)},
            }));
        }
        let url = self.project_url(&format!("wit/workitems/${}", item.work_item_type));
        self.patch_json(Method::POST, &url, ops).await
    }

    async fn update_work_item(&self, id: u32, updates: &[FieldUpdate]) -> ApiResult<WorkItem> {
        let ops = updates
            .iter()
            .map(|update| {
                let mut op = json!({
                    "op": update.op.as_str(),
                    "path": format!("/fields/{}", update.field),
                });
                if !update.value.is_null() {
                    op["value"] = update.value.clone();
                }
                op
            })
            .collect();
        let url = self.project_url(&format!("wit/workitems/{id}"));
        self.patch_json(Method::PATCH, &url, ops).await
    }

    async fn delete_work_item(&self, id: u32) -> ApiResult<()> {
        let url = self.project_url(&format!("wit/workitems/{id}"));
        match Self::send(self.request(Method::DELETE, &url)).await {
            Ok(_) => Ok(()),
            Err(ApiError::Status { status: 404, .. }) => Err(ApiError::NotFound(id)),
            Err(err) => Err(err),
        }
    }

    async fn list_work_item_states(&self, work_item_type: &str) -> ApiResult<Vec<String>> {
        let url = self.project_url(&format!("wit/workitemtypes/{work_item_type}/states"));
        let states: ValueList<RawState> = self.get_json(&url).await?;
        Ok(states.value.into_iter().map(|s| s.name).collect())
    }

    async fn get_work_item_type(&self, name: &str) -> ApiResult<WorkItemType> {
        let url = self.project_url(&format!("wit/workitemtypes/{name}"));
        let raw: RawWorkItemType = self.get_json(&url).await?;
        Ok(WorkItemType {
            name: raw.name,
            description: raw.description,
            states: raw.states.into_iter().map(|s| s.name).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AzureDevOpsClient {
        AzureDevOpsClient::new(ClientConfig {
            organization: "https://dev.azure.com/contoso/".into(),
            project: "Fabrikam".into(),
            token: None,
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.project_url("wit/queries?$depth=2"),
            "https://dev.azure.com/contoso/Fabrikam/_apis/wit/queries?$depth=2"
        );
        assert_eq!(
            client.work_item_url(7),
            "https://dev.azure.com/contoso/_apis/wit/workItems/7"
        );
    }

    #[test]
    fn test_missing_configuration() {
        let err = AzureDevOpsClient::new(ClientConfig {
            organization: String::new(),
            project: "p".into(),
            token: None,
            timeout: Duration::from_secs(1),
        })
        .err()
        .expect("should fail");
        assert!(matches!(err, ApiError::NotConfigured(_)));
    }

    #[test]
    fn test_wiql_ids_dedupe_tree_results() {
        let raw = r#"{
            "workItemRelations": [
                {"source": null, "target": {"id": 1}},
                {"source": {"id": 1}, "target": {"id": 2}},
                {"source": {"id": 1}, "target": {"id": 3}}
            ]
        }"#;
        let result: WiqlResult = serde_json::from_str(raw).expect("parse");
        assert_eq!(wiql_ids(&result), vec![1, 2, 3]);
    }

    #[test]
    fn test_raw_work_item_conversion() {
        let raw = r#"{
            "id": 5, "rev": 2, "url": "https://x/_apis/wit/workItems/5",
            "fields": {"System.Title": "Hello"},
            "relations": [{"rel": "System.LinkTypes.Hierarchy-Forward", "url": "https://x/_apis/wit/workItems/6"}]
        }"#;
        let item: WorkItem = serde_json::from_str::<RawWorkItem>(raw).expect("parse").into();
        assert_eq!(item.title(), "Hello");
        assert_eq!(item.child_ids(), vec![6]);
    }
}
