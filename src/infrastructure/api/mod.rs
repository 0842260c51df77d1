//! Work item service abstraction
//!
//! The dashboard only ever talks to [`WorkItemApi`]; the HTTP implementation lives in
//! [`client`]. Every call returns a value or an [`ApiError`], retries and timeouts are
//! the implementation's concern.

mod client;

pub use client::{AzureDevOpsClient, ClientConfig};

use thiserror::Error;

use crate::domain::{FieldUpdate, NewWorkItem, QueryNode, WorkItem, WorkItemType};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("work item #{0} not found")]
    NotFound(u32),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Operations the dashboard needs from the tracking service
#[async_trait::async_trait]
pub trait WorkItemApi: Send + Sync + 'static {
    /// Shared query hierarchy (folders and saved queries)
    async fn list_queries(&self) -> ApiResult<Vec<QueryNode>>;

    /// Run a saved query and return the matching work items
    async fn execute_query(&self, query_id: &str) -> ApiResult<Vec<WorkItem>>;

    /// Single work item including its relations
    async fn get_work_item(&self, id: u32) -> ApiResult<WorkItem>;

    async fn create_work_item(&self, item: &NewWorkItem) -> ApiResult<WorkItem>;

    async fn update_work_item(&self, id: u32, updates: &[FieldUpdate]) -> ApiResult<WorkItem>;

    async fn delete_work_item(&self, id: u32) -> ApiResult<()>;

    /// State names allowed for a work item type, in workflow order
    async fn list_work_item_states(&self, work_item_type: &str) -> ApiResult<Vec<String>>;

    async fn get_work_item_type(&self, name: &str) -> ApiResult<WorkItemType>;
}

/// Stand-in used when the client cannot be built; every call fails with the reason.
#[derive(Debug, Clone)]
pub struct UnavailableApi {
    reason: String,
}

impl UnavailableApi {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> ApiResult<T> {
        Err(ApiError::NotConfigured(self.reason.clone()))
    }
}

#[async_trait::async_trait]
impl WorkItemApi for UnavailableApi {
    async fn list_queries(&self) -> ApiResult<Vec<QueryNode>> {
        self.fail()
    }

    async fn execute_query(&self, _query_id: &str) -> ApiResult<Vec<WorkItem>> {
        self.fail()
    }

    async fn get_work_item(&self, _id: u32) -> ApiResult<WorkItem> {
        self.fail()
    }

    async fn create_work_item(&self, _item: &NewWorkItem) -> ApiResult<WorkItem> {
        self.fail()
    }

    async fn update_work_item(&self, _id: u32, _updates: &[FieldUpdate]) -> ApiResult<WorkItem> {
        self.fail()
    }

    async fn delete_work_item(&self, _id: u32) -> ApiResult<()> {
        self.fail()
    }

    async fn list_work_item_states(&self, _work_item_type: &str) -> ApiResult<Vec<String>> {
        self.fail()
    }

    async fn get_work_item_type(&self, _name: &str) -> ApiResult<WorkItemType> {
        self.fail()
    }
}
