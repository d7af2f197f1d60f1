//! Directed-graph workflow over a shared [`WorkflowState`].
//!
//! The graph is an immutable value; [`execute`] walks it once per run with a
//! fresh state, so concurrent runs share only the topology.

use crate::error::PipelineError;
use crate::types::{DraftAnswer, FinalAnswer, ResearchPlan, ResearchResult, Style};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Research,
    Draft,
    Refine,
}

impl Stage {
    pub fn description(self) -> &'static str {
        match self {
            Stage::Plan => "research plan generation",
            Stage::Research => "research execution",
            Stage::Draft => "answer drafting",
            Stage::Refine => "answer refinement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stage(Stage),
    End,
}

#[derive(Debug, Clone)]
struct Edge {
    from: Stage,
    on_success: Next,
    on_error: Next,
}

#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    entry: Stage,
    edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// plan → research → draft → refine, ending early on any error.
    pub fn research_pipeline() -> Self {
        let step = |from, to| Edge {
            from,
            on_success: to,
            on_error: Next::End,
        };
        Self {
            entry: Stage::Plan,
            edges: vec![
                step(Stage::Plan, Next::Stage(Stage::Research)),
                step(Stage::Research, Next::Stage(Stage::Draft)),
                step(Stage::Draft, Next::Stage(Stage::Refine)),
                step(Stage::Refine, Next::End),
            ],
        }
    }

    pub fn entry(&self) -> Stage {
        self.entry
    }

    /// Where to go after `from`. A stage without an outgoing edge ends the run.
    pub fn next(&self, from: Stage, failed: bool) -> Next {
        self.edges
            .iter()
            .find(|edge| edge.from == from)
            .map(|edge| if failed { edge.on_error } else { edge.on_success })
            .unwrap_or(Next::End)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub query: String,
    pub research_plan: Option<ResearchPlan>,
    pub research_results: Option<ResearchResult>,
    pub draft_answer: Option<DraftAnswer>,
    pub final_answer: Option<FinalAnswer>,
    pub style: Style,
    /// Set by the first failing stage; ends the run.
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn new(query: &str, style: Style) -> Self {
        Self {
            query: query.to_string(),
            style,
            ..Default::default()
        }
    }
}

/// Executes one stage against the shared state.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run_stage(&self, stage: Stage, state: &mut WorkflowState) -> Result<(), PipelineError>;
}

/// Walk `graph` from its entry stage until it reaches the end.
///
/// A stage error never escapes: it is recorded in `state.error` together with
/// the failing stage, and the error edge is followed.
pub async fn execute(graph: &WorkflowGraph, runner: &dyn StageRunner, mut state: WorkflowState) -> WorkflowState {
    let mut current = Next::Stage(graph.entry());

    while let Next::Stage(stage) = current {
        tracing::debug!(?stage, query = %state.query, "running workflow stage");
        if let Err(e) = runner.run_stage(stage, &mut state).await {
            let message = format!("Error in {}: {e}", stage.description());
            tracing::warn!(?stage, "{message}");
            state.error = Some(message);
        }
        current = graph.next(stage, state.error.is_some());
    }

    state
}
