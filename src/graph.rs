use std::collections::BTreeMap;

use tracing::debug;

use crate::model::work_item::{WorkItem, WorkItemType};
use crate::providers::RemoteWorkItem;

/// The assembled two-level hierarchy: an arena keyed by work item id.
///
/// Every node has been through assembly, so its `children` list is present
/// (possibly empty) and holds direct children only. The copies stored inside
/// a `children` list are pre-assembly snapshots; grandchildren are reachable
/// through the arena, not through nested copies.
#[derive(Debug, Default)]
pub struct WorkItemGraph {
    nodes: BTreeMap<i64, WorkItem>,
}

impl WorkItemGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level items, id-ascending. Descendants hang off `children` and are
    /// not repeated here.
    pub fn roots(&self) -> Vec<&WorkItem> {
        self.nodes
            .values()
            .filter(|n| n.parent_id.is_none())
            .collect()
    }

    /// All assembled items, id-ascending.
    pub fn nodes(&self) -> impl Iterator<Item = &WorkItem> {
        self.nodes.values()
    }
}

/// Rebuilds the parent/child hierarchy from a flat, possibly incomplete list
/// of remote records.
///
/// Two phases: the first converts records and establishes parent linkage,
/// synthesizing a placeholder parent whenever a referenced id is not among
/// the records; the second recomputes every node's children by filtering the
/// full buffer on `parent_id`. The second pass is the authoritative child
/// assignment, so the final shape does not depend on input order.
pub fn assemble(records: &[RemoteWorkItem]) -> WorkItemGraph {
    let mut buffer: BTreeMap<i64, WorkItem> = BTreeMap::new();

    for record in records {
        let mut item = buffer
            .remove(&record.id)
            .unwrap_or_else(|| to_work_item(record));

        if let Some(parent_id) = record.parent_id {
            debug!(parent_id, work_item = record.id, "linking work item to parent");
            if !buffer.contains_key(&parent_id) {
                let parent = records
                    .iter()
                    .find(|r| r.id == parent_id)
                    .map(to_work_item)
                    .unwrap_or_else(|| placeholder_parent(parent_id));
                buffer.insert(parent_id, parent);
            }
            item = item.with_parent_id(parent_id);
        }

        buffer.insert(record.id, item);
    }

    let linked: Vec<WorkItem> = buffer.values().cloned().collect();
    let nodes = buffer
        .into_iter()
        .map(|(id, node)| {
            let children: Vec<WorkItem> = linked
                .iter()
                .filter(|other| other.parent_id == Some(id))
                .cloned()
                .collect();
            (id, node.with_children(children))
        })
        .collect();

    WorkItemGraph { nodes }
}

/// Stand-in for a parent the remote data never returned. Keeps the real id so
/// children still link up; everything else is minimal.
fn placeholder_parent(parent_id: i64) -> WorkItem {
    WorkItem {
        id: parent_id,
        kind: WorkItemType::Epic,
        title: format!("Work item {parent_id}"),
        state: "New".into(),
        completed_work: 0.0,
        remaining_work: 0.0,
        parent_id: None,
        children: None,
    }
}

fn to_work_item(record: &RemoteWorkItem) -> WorkItem {
    WorkItem {
        id: record.id,
        kind: record.kind,
        title: record.title.clone(),
        state: record.state.clone(),
        completed_work: record.completed_work,
        remaining_work: record.remaining_work,
        parent_id: None,
        children: None,
    }
}
