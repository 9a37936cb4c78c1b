pub mod azure;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Configuration;
use crate::model::work_item::WorkItemType;

/// A flat work item record as the remote service reports it, before any
/// hierarchy assembly. `parent_id` comes from the item's relations and may
/// point at an item the query never returned.
#[derive(Debug, Clone)]
pub struct RemoteWorkItem {
    pub id: i64,
    pub kind: WorkItemType,
    pub title: String,
    pub state: String,
    pub completed_work: f64,
    pub remaining_work: f64,
    pub parent_id: Option<i64>,
}

/// Field changes pushed back when a time entry is saved. `state` is only set
/// when the entry asks to close the item.
#[derive(Debug, Clone)]
pub struct WorkItemUpdate {
    pub remaining_work: f64,
    pub completed_work: f64,
    pub state: Option<String>,
}

#[async_trait]
pub trait WorkTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Items in the current iteration for the configured team, assigned to
    /// the authenticated user, not yet Closed.
    async fn list_sprint_work_items(&self) -> Result<Vec<RemoteWorkItem>>;

    /// Fetches specific items (with their parent relations), used to resolve
    /// parent ids the sprint query did not return.
    async fn fetch_items_with_relations(&self, ids: &[i64]) -> Result<Vec<RemoteWorkItem>>;

    async fn update_work_item(&self, id: i64, update: &WorkItemUpdate) -> Result<()>;
}


pub fn create_tracker(config: &Configuration) -> Box<dyn WorkTracker> {
    Box::new(azure::AzureDevOpsTracker::new(
        config.services_url.clone(),
        config.project.clone(),
        config.team.clone(),
        config.pat.clone(),
    ))
}
