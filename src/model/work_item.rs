use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemType {
    Epic,
    Feature,
    UserStory,
    Task,
    Bug,
}

impl WorkItemType {
    /// Stable name used for display and for the deterministic eligibility sort.
    pub fn name(&self) -> &'static str {
        match self {
            WorkItemType::Epic => "Epic",
            WorkItemType::Feature => "Feature",
            WorkItemType::UserStory => "User Story",
            WorkItemType::Task => "Task",
            WorkItemType::Bug => "Bug",
        }
    }
}

/// An immutable snapshot of a remote work item.
///
/// The hierarchy is represented with id back-references rather than live
/// parent pointers: `parent_id` points one level up, `children` is populated
/// by graph assembly and owned by this snapshot. `children: None` means the
/// item has not been through assembly yet; `Some(vec![])` means assembly ran
/// and found nothing below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub kind: WorkItemType,
    pub title: String,
    pub state: String,
    pub completed_work: f64,
    pub remaining_work: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<WorkItem>>,
}

impl WorkItem {
    pub fn with_parent_id(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_children(mut self, children: Vec<WorkItem>) -> Self {
        self.children = Some(children);
        self
    }

    /// Real ids are assigned by the remote system and are always positive.
    /// Anything below 1 was synthesized locally and must be translated back
    /// to its real parent before submission.
    pub fn is_placeholder_only(&self) -> bool {
        self.id < 1
    }

    pub fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, kind: WorkItemType) -> WorkItem {
        WorkItem {
            id,
            kind,
            title: format!("Item {id}"),
            state: "Active".into(),
            completed_work: 0.0,
            remaining_work: 0.0,
            parent_id: None,
            children: None,
        }
    }

    #[test]
    fn placeholder_detection_is_by_id_sign() {
        assert!(item(-7, WorkItemType::Task).is_placeholder_only());
        assert!(item(0, WorkItemType::Epic).is_placeholder_only());
        assert!(!item(1, WorkItemType::Task).is_placeholder_only());
    }

    #[test]
    fn empty_children_is_distinct_from_unassembled() {
        let raw = item(1, WorkItemType::UserStory);
        assert!(raw.children.is_none());
        assert!(!raw.has_children());

        let assembled = raw.with_children(vec![]);
        assert!(assembled.children.is_some());
        assert!(!assembled.has_children());
    }

    #[test]
    fn with_parent_id_links_one_level_up() {
        let child = item(5, WorkItemType::Task).with_parent_id(2);
        assert_eq!(child.parent_id, Some(2));
    }
}
