use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::TaskId;

/// Unique identifier for a pipeline.
pub type PipelineId = String;

/// Dependency edges keyed by source vertex.
pub type Dag = HashMap<String, Vec<String>>;

/// Descriptive record of a pipeline: which data sources feed which tasks
/// and which tasks feed which data sources.
///
/// Pure data carrier; graph resolution and topological ordering live
/// outside the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineModel {
    pub id: PipelineId,
    pub name: String,
    pub properties: HashMap<String, Value>,
    /// Edges from data sources to the tasks consuming them.
    pub source_task_edges: Dag,
    /// Edges from tasks to the data sources they produce.
    pub task_source_edges: Dag,
}

impl PipelineModel {
    /// Task ids referenced by either edge map.
    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .source_task_edges
            .values()
            .flatten()
            .chain(self.task_source_edges.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
