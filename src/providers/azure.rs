use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{RemoteWorkItem, WorkItemUpdate, WorkTracker};
use crate::model::work_item::WorkItemType;

const API_VERSION: &str = "7.1";
const PARENT_RELATION: &str = "System.LinkTypes.Hierarchy-Reverse";

pub struct AzureDevOpsTracker {
    base_url: String,
    project: String,
    team: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOpsTracker {
    pub fn new(services_url: String, project: String, team: String, pat: String) -> Self {
        // PATs go out as basic auth with an empty user name
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{pat}"));
        let base_url = format!(
            "{}/{}",
            services_url.trim_end_matches('/'),
            urlencoding::encode(&project)
        );
        Self {
            base_url,
            project,
            team,
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn wiql_query(&self) -> String {
        format!(
            "Select [System.Id] From WorkItems \
             Where [System.IterationPath] = @currentIteration('[{}]\\{}') \
             and [System.AssignedTo] = @Me \
             and [System.State] <> 'Closed'",
            self.project, self.team
        )
    }

    async fn query_sprint_ids(&self) -> Result<Vec<i64>> {
        let query = self.wiql_query();
        debug!(%query, "built wiql query");

        let url = format!(
            "{}/{}/_apis/wit/wiql?api-version={API_VERSION}",
            self.base_url,
            urlencoding::encode(&self.team)
        );
        let resp = self
            .client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .json(&json!({ "query": query }))
            .send()
            .await
            .context("Sprint query request failed")?
            .error_for_status()
            .context("Sprint query rejected")?;

        let result: WiqlResponse = resp
            .json()
            .await
            .context("Failed to parse sprint query response")?;
        Ok(result.work_items.into_iter().map(|r| r.id).collect())
    }
}

#[derive(Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WiqlItemRef>,
}

#[derive(Deserialize)]
struct WiqlItemRef {
    id: i64,
}

#[derive(Deserialize)]
struct WorkItemList {
    value: Vec<WorkItemPayload>,
}

#[derive(Deserialize)]
struct WorkItemPayload {
    id: i64,
    fields: WorkItemFields,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Deserialize)]
struct WorkItemFields {
    #[serde(rename = "System.WorkItemType")]
    work_item_type: Option<String>,
    #[serde(rename = "System.Title")]
    title: Option<String>,
    #[serde(rename = "System.State")]
    state: Option<String>,
    #[serde(rename = "Microsoft.VSTS.Scheduling.CompletedWork")]
    completed_work: Option<f64>,
    #[serde(rename = "Microsoft.VSTS.Scheduling.RemainingWork")]
    remaining_work: Option<f64>,
}

#[derive(Deserialize)]
struct Relation {
    rel: String,
    url: String,
}

fn parent_id(relations: &[Relation]) -> Option<i64> {
    relations
        .iter()
        .find(|r| r.rel == PARENT_RELATION)
        .and_then(|r| r.url.rsplit('/').next())
        .and_then(|segment| segment.parse().ok())
}

fn kind_from_name(name: Option<&str>) -> WorkItemType {
    match name {
        Some("Bug") => WorkItemType::Bug,
        Some("Task") => WorkItemType::Task,
        Some("Feature") => WorkItemType::Feature,
        Some("Epic") => WorkItemType::Epic,
        _ => WorkItemType::UserStory,
    }
}

fn to_remote_work_item(payload: WorkItemPayload) -> RemoteWorkItem {
    let parent = parent_id(&payload.relations);
    RemoteWorkItem {
        id: payload.id,
        kind: kind_from_name(payload.fields.work_item_type.as_deref()),
        title: payload.fields.title.unwrap_or_default(),
        state: payload.fields.state.unwrap_or_default(),
        completed_work: payload.fields.completed_work.unwrap_or(0.0),
        remaining_work: payload.fields.remaining_work.unwrap_or(0.0),
        parent_id: parent,
    }
}

#[async_trait]
impl WorkTracker for AzureDevOpsTracker {
    fn name(&self) -> &str {
        "Azure DevOps"
    }

    async fn list_sprint_work_items(&self) -> Result<Vec<RemoteWorkItem>> {
        let ids = self.query_sprint_ids().await?;
        debug!(count = ids.len(), "sprint query returned work items");
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_items_with_relations(&ids).await
    }

    async fn fetch_items_with_relations(&self, ids: &[i64]) -> Result<Vec<RemoteWorkItem>> {
        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/_apis/wit/workitems?ids={id_list}&$expand=relations&api-version={API_VERSION}",
            self.base_url
        );

        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .context("Work item fetch request failed")?
            .error_for_status()
            .context("Work item fetch rejected")?;

        let list: WorkItemList = resp
            .json()
            .await
            .context("Failed to parse work item response")?;
        Ok(list.value.into_iter().map(to_remote_work_item).collect())
    }

    async fn update_work_item(&self, id: i64, update: &WorkItemUpdate) -> Result<()> {
        let mut ops = vec![
            json!({
                "op": "add",
                "path": "/fields/Microsoft.VSTS.Scheduling.RemainingWork",
                "value": update.remaining_work,
            }),
            json!({
                "op": "add",
                "path": "/fields/Microsoft.VSTS.Scheduling.CompletedWork",
                "value": update.completed_work,
            }),
        ];
        if let Some(state) = &update.state {
            ops.push(json!({
                "op": "add",
                "path": "/fields/System.State",
                "value": state,
            }));
        }

        let url = format!(
            "{}/_apis/wit/workitems/{id}?api-version={API_VERSION}",
            self.base_url
        );
        self.client
            .patch(&url)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json-patch+json")
            .json(&ops)
            .send()
            .await
            .with_context(|| format!("Update request for work item {id} failed"))?
            .error_for_status()
            .with_context(|| format!("Update for work item {id} rejected"))?;
        Ok(())
    }
}
