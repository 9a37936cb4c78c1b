use std::collections::BTreeSet;

use chrono::Local;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::TrackerError;
use crate::graph::{self, WorkItemGraph};
use crate::model::time_entry::{TimeEntry, EXPECTED_HOURS_PER_DAY};
use crate::model::work_item::{WorkItem, WorkItemType};
use crate::providers::{WorkItemUpdate, WorkTracker};
use crate::store::TimeEntryStore;

pub const NO_TASK_TITLE: &str = "(No task - time will be captured in the parent)";

/// Save pipeline state. `Complete` doubles as the idle state before any save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Saving,
    Complete,
    Error { entry_index: usize, work_item_id: i64 },
}

/// Progress notifications for an observing interface. Optional; the facade's
/// methods return their results directly either way.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Loading,
    Loaded {
        item_count: usize,
        total_hours_logged_today: f64,
    },
    SaveStateChanged(SaveState),
}

/// The curated result of a fetch: items eligible for time entry, each
/// guaranteed to carry at least one selectable leaf, plus the hours already
/// logged today.
#[derive(Debug, Clone, Default)]
pub struct LoadedWorkItems {
    pub items: Vec<WorkItem>,
    pub total_hours_logged_today: f64,
}

/// Orchestrates the fetch and save pipelines against one remote client and
/// one local store. The client's identity is derived from the configuration,
/// so swapping configuration goes through [`TimeTracker::reconfigure`] which
/// rebuilds the tracker with a fresh client.
pub struct TimeTracker {
    config: Configuration,
    client: Box<dyn WorkTracker>,
    store: TimeEntryStore,
    save_state: SaveState,
    // serializes overlapping fetches; two refreshes must not race
    fetch_guard: Mutex<()>,
    events: Option<mpsc::UnboundedSender<TrackerEvent>>,
}

impl TimeTracker {
    pub fn new(config: Configuration, client: Box<dyn WorkTracker>, store: TimeEntryStore) -> Self {
        Self {
            config,
            client,
            store,
            save_state: SaveState::Complete,
            fetch_guard: Mutex::new(()),
            events: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TrackerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Replaces the configuration, rebuilding the remote client from it.
    pub fn reconfigure(self, config: Configuration) -> Self {
        let client = crate::providers::create_tracker(&config);
        Self {
            config,
            client,
            store: self.store,
            save_state: SaveState::Complete,
            fetch_guard: Mutex::new(()),
            events: self.events,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn save_state(&self) -> &SaveState {
        &self.save_state
    }

    pub async fn refresh(&self) -> Result<Option<LoadedWorkItems>, TrackerError> {
        debug!("refresh triggered");
        self.find_work_items_to_entry_time().await
    }

    /// The fetch pipeline. Returns `Ok(None)` when the configuration is
    /// invalid (nothing fetched, nothing notified). When today's logged hours
    /// already reach the expected day, reports an empty eligible list without
    /// touching the remote service.
    pub async fn find_work_items_to_entry_time(
        &self,
    ) -> Result<Option<LoadedWorkItems>, TrackerError> {
        if !self.config.is_valid() {
            debug!("configuration incomplete, lookup not happening");
            return Ok(None);
        }

        let _in_flight = self.fetch_guard.lock().await;
        self.emit(TrackerEvent::Loading);

        let today = Local::now().date_naive();
        let entries_today = self.store.entries_for(today);
        let total_hours_logged_today: f64 = entries_today.iter().map(|e| e.hours).sum();
        info!(
            entries = entries_today.len(),
            hours = total_hours_logged_today,
            "time already logged today"
        );

        let items = if total_hours_logged_today >= f64::from(EXPECTED_HOURS_PER_DAY) {
            debug!(
                threshold = EXPECTED_HOURS_PER_DAY,
                "expected hours already logged, skipping remote lookup"
            );
            Vec::new()
        } else {
            self.fetch_eligible_items().await?
        };

        self.emit(TrackerEvent::Loaded {
            item_count: items.len(),
            total_hours_logged_today,
        });
        Ok(Some(LoadedWorkItems {
            items,
            total_hours_logged_today,
        }))
    }

    /// The save pipeline. Entries persist strictly in input order, local
    /// store first, then the remote update. The first remote failure aborts
    /// the rest of the batch: entries already written locally stay there as
    /// pending reconciliation, the state records which entry failed, and the
    /// tracker remains usable for a retry.
    pub async fn save_time_entries(
        &mut self,
        entries: Vec<TimeEntry>,
    ) -> Result<Option<LoadedWorkItems>, TrackerError> {
        info!(
            count = entries.len(),
            date = %Local::now().date_naive(),
            "saving time entries"
        );
        self.set_save_state(SaveState::Saving);

        for (entry_index, entry) in entries.iter().enumerate() {
            let work_item_id = entry.work_item.id;
            if entry.work_item.is_placeholder_only() {
                self.set_save_state(SaveState::Error {
                    entry_index,
                    work_item_id,
                });
                return Err(TrackerError::PlaceholderTarget(work_item_id));
            }

            // local first: recoverable by editing the store file
            if let Err(e) = self.store.append(&entry.to_persistable()) {
                self.set_save_state(SaveState::Error {
                    entry_index,
                    work_item_id,
                });
                return Err(e);
            }

            let update = WorkItemUpdate {
                remaining_work: entry.compute_remaining_work(),
                completed_work: entry.compute_completed_work(),
                state: entry.close_work_item.then(|| "Closed".to_string()),
            };
            info!(
                work_item = work_item_id,
                completed = update.completed_work,
                remaining = update.remaining_work,
                close = entry.close_work_item,
                "updating remote work item"
            );
            if let Err(source) = self.client.update_work_item(work_item_id, &update).await {
                warn!(
                    work_item = work_item_id,
                    err = %source,
                    "remote update failed, aborting remaining entries"
                );
                self.set_save_state(SaveState::Error {
                    entry_index,
                    work_item_id,
                });
                return Err(TrackerError::Update {
                    entry_index,
                    work_item_id,
                    source,
                });
            }
        }

        // every entry went through; a failure in the trailing refresh does
        // not make the batch unsaved
        let refreshed = match self.find_work_items_to_entry_time().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(err = %e, "refresh after save failed, entries are saved regardless");
                None
            }
        };
        self.set_save_state(SaveState::Complete);
        Ok(refreshed)
    }

    async fn fetch_eligible_items(&self) -> Result<Vec<WorkItem>, TrackerError> {
        let mut records = self
            .client
            .list_sprint_work_items()
            .await
            .map_err(TrackerError::Fetch)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // parents the sprint query referenced but did not return
        let known: BTreeSet<i64> = records.iter().map(|r| r.id).collect();
        let missing: Vec<i64> = records
            .iter()
            .filter_map(|r| r.parent_id)
            .filter(|id| *id > 0 && !known.contains(id))
            .collect::<BTreeSet<i64>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            debug!(count = missing.len(), "resolving referenced parent items");
            let parents = self
                .client
                .fetch_items_with_relations(&missing)
                .await
                .map_err(TrackerError::Fetch)?;
            records.extend(parents);
        }

        let graph = graph::assemble(&records);
        Ok(eligible_work_items(
            &graph,
            self.config.allow_entry_without_task,
        ))
    }

    fn set_save_state(&mut self, state: SaveState) {
        self.save_state = state.clone();
        self.emit(TrackerEvent::SaveStateChanged(state));
    }

    fn emit(&self, event: TrackerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Applies the eligibility rules to an assembled graph: keep user stories and
/// bugs, order them reproducibly (type name, then id), and make sure each one
/// has a selectable leaf.
fn eligible_work_items(graph: &WorkItemGraph, allow_entry_without_task: bool) -> Vec<WorkItem> {
    let mut items: Vec<WorkItem> = graph
        .nodes()
        .filter(|n| matches!(n.kind, WorkItemType::UserStory | WorkItemType::Bug))
        .cloned()
        .collect();
    items.sort_by(|a, b| a.kind.name().cmp(b.kind.name()).then(a.id.cmp(&b.id)));
    items
        .into_iter()
        .map(|item| maybe_create_fake_child(item, allow_entry_without_task))
        .collect()
}

/// Bugs never carry tasks; user stories may be task-less when the
/// configuration allows direct entry. In every other childless case a fake
/// task leaf is synthesized so there is always something to select. Its id is
/// the negated parent id, disjoint from the remote system's positive ids.
fn maybe_create_fake_child(item: WorkItem, allow_entry_without_task: bool) -> WorkItem {
    if item.has_children() {
        return item;
    }
    let needs_fake = match item.kind {
        WorkItemType::Bug => true,
        WorkItemType::UserStory => !allow_entry_without_task,
        _ => false,
    };
    if !needs_fake {
        return item;
    }

    let fake = WorkItem {
        id: -item.id,
        kind: WorkItemType::Task,
        title: NO_TASK_TITLE.into(),
        state: "New".into(),
        completed_work: 0.0,
        remaining_work: 0.0,
        parent_id: Some(item.id),
        children: Some(Vec::new()),
    };
    item.with_children(vec![fake])
}

/// Resolves a selected id to the snapshot a time entry should target. A
/// placeholder leaf translates back to its real parent, the way the original
/// selection surface did before constructing entries.
pub fn entry_target(items: &[WorkItem], id: i64) -> Option<WorkItem> {
    for item in items {
        if item.id == id {
            return Some(item.clone());
        }
        if let Some(children) = &item.children {
            for child in children {
                if child.id == id {
                    return Some(if child.is_placeholder_only() {
                        item.clone()
                    } else {
                        child.clone()
                    });
                }
            }
        }
    }
    None
}
