//! Task graph execution.
//!
//! Stages run one at a time in dependency order (the pipeline is a
//! sequence of whole-tree transforms; parallelism lives inside stages).
//! A failing stage halts the graph - its dependents are skipped and the
//! error names the failing stage. Cancellation is honored between
//! stages, never mid-stage; an aborted run contributes no manifest.

use rustc_hash::FxHashSet;

use crate::core::is_shutdown;
use crate::debug;

use super::{GraphError, Stage, StageContext, StageId};

/// A directed acyclic graph of build stages.
#[derive(Default)]
pub struct TaskGraph {
    stages: Vec<Box<dyn Stage>>,
}

/// Summary of a completed graph run.
#[derive(Debug)]
pub struct GraphReport {
    /// Stages that ran, in execution order.
    pub completed: Vec<StageId>,
    /// Total files touched across all stages.
    pub files: usize,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage to the graph.
    pub fn push(&mut self, stage: impl Stage + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage ids in insertion order.
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Run all stages in dependency order.
    ///
    /// Manifest sub-passes from successful stages are pushed onto the
    /// context as they complete; a failed stage contributes nothing.
    pub fn run(&self, ctx: &mut StageContext) -> Result<GraphReport, GraphError> {
        self.validate()?;

        let mut completed: Vec<StageId> = Vec::with_capacity(self.stages.len());
        let mut pending: Vec<&dyn Stage> = self.stages.iter().map(Box::as_ref).collect();
        let mut files = 0;

        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|s| s.deps().iter().all(|d| completed.contains(d)));
            let Some(idx) = ready else {
                return Err(GraphError::Cycle(pending[0].id()));
            };
            let stage = pending.remove(idx);

            if is_shutdown() {
                return Err(GraphError::Aborted { stage: stage.id() });
            }

            debug!("build"; "stage {}", stage.id());
            let output = stage.run(ctx).map_err(|error| GraphError::Stage {
                stage: stage.id(),
                error,
            })?;

            files += output.files;
            if let Some(manifest) = output.manifest {
                ctx.push_manifest(manifest);
            }
            completed.push(stage.id());
        }

        Ok(GraphReport { completed, files })
    }

    /// Check that every declared dependency is part of this graph.
    ///
    /// A build target that selects a subsequence of the full pipeline
    /// must select its hash-producers along with its consumers; this
    /// turns a mis-built subsequence into a hard error instead of a
    /// silently un-rewritten tree.
    fn validate(&self) -> Result<(), GraphError> {
        let ids: FxHashSet<StageId> = self.stages.iter().map(|s| s.id()).collect();
        for stage in &self.stages {
            for dep in stage.deps() {
                if !ids.contains(dep) {
                    return Err(GraphError::UnknownDependency {
                        stage: stage.id(),
                        dep: *dep,
                    });
                }
            }
        }
        Ok(())
    }
}
