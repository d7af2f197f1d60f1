use crate::answer::AnswerAgent;
use crate::call::CallPolicy;
use crate::config::Config;
use crate::error::{PipelineError, ResearchError};
use crate::llm::build_client;
use crate::planner::PlanGenerator;
use crate::research::{ResearchCoordinator, ResearchProgress};
use crate::search::{SourceFetcher, TavilyClient};
use crate::sources::cited_sources;
use crate::synthesizer::ResearchSynthesizer;
use crate::types::{FinalAnswer, ReportMetadata, ResearchReport, ResearchResult, SearchResult, Style};
use crate::workflow::{execute, Stage, StageRunner, WorkflowGraph, WorkflowState};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const ERROR_PREFIX: &str = "An error occurred during research: ";

/// Coordinates research and answer agents across the sequential, multi-agent
/// and workflow modes.
pub struct ResearchManager {
    coordinator: ResearchCoordinator,
    answer_agent: AnswerAgent,
    graph: WorkflowGraph,
    workflow_agents: usize,
}

impl ResearchManager {
    pub fn new(coordinator: ResearchCoordinator, answer_agent: AnswerAgent, workflow_agents: usize) -> Self {
        Self {
            coordinator,
            answer_agent,
            graph: WorkflowGraph::research_pipeline(),
            workflow_agents,
        }
    }

    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let policy = CallPolicy::new(config.research.call_timeout(), cancel);

        let research_llm = build_client(&config.llm, config.llm.research_model())
            .context("failed to set up the research model")?;
        let answer_llm = build_client(&config.llm, config.llm.answer_model())
            .context("failed to set up the answer model")?;
        let api_key = config
            .search
            .api_key
            .clone()
            .context("TAVILY_API_KEY is not set")?;
        let search = Arc::new(TavilyClient::new(config.search.endpoint.clone(), api_key));

        let coordinator = ResearchCoordinator::new(
            PlanGenerator::new(research_llm.clone(), policy.clone()),
            SourceFetcher::new(search, policy.clone(), &config.search),
            ResearchSynthesizer::new(
                research_llm,
                policy.clone(),
                config.research.excerpt_chars,
                config.research.prompt_source_limit,
            ),
            policy.token().clone(),
            &config.search,
            &config.research,
        );
        let answer_agent = AnswerAgent::new(answer_llm, policy);

        Ok(Self::new(coordinator, answer_agent, config.research.workflow_agents))
    }

    pub fn set_progress_channel(&mut self, tx: mpsc::UnboundedSender<ResearchProgress>) {
        self.coordinator.set_progress_channel(tx);
    }

    /// Single-agent pipeline: research, draft, refine.
    pub async fn process_query(&self, query: &str, style: &Style) -> Result<ResearchReport, PipelineError> {
        let research = self.coordinator.execute_research(query).await?;
        self.answer(query, &research, style).await
    }

    /// Search-only mode: raw search answer and sources, no model-written answer.
    pub async fn quick_search(&self, query: &str) -> Result<SearchResult, ResearchError> {
        self.coordinator.quick_search(query).await
    }

    pub async fn multi_agent_research(&self, query: &str, num_agents: usize) -> Result<ResearchResult, ResearchError> {
        self.coordinator.multi_agent_research(query, num_agents).await
    }

    /// Fan-out research across `num_agents`, then draft and refine.
    pub async fn run_multi_agent(
        &self,
        query: &str,
        num_agents: usize,
        style: &Style,
    ) -> Result<ResearchReport, PipelineError> {
        let research = self.multi_agent_research(query, num_agents).await?;
        self.answer(query, &research, style).await
    }

    /// Run the plan → research → draft → refine graph. Failures are reported
    /// inside the returned report rather than as an error.
    pub async fn run_workflow(&self, query: &str, style: Style) -> ResearchReport {
        let state = execute(&self.graph, self, WorkflowState::new(query, style)).await;

        if let Some(error) = state.error {
            return ResearchReport {
                query: query.to_string(),
                answer: format!("{ERROR_PREFIX}{error}"),
                style: None,
                sources: Vec::new(),
                metadata: None,
                error: Some(error),
            };
        }

        match (state.final_answer, state.research_results) {
            (Some(final_answer), Some(research)) => {
                self.coordinator.send_progress(ResearchProgress::Completed);
                build_report(final_answer, &research)
            }
            _ => {
                let error = "workflow ended without an answer".to_string();
                ResearchReport {
                    query: query.to_string(),
                    answer: format!("{ERROR_PREFIX}{error}"),
                    style: None,
                    sources: Vec::new(),
                    metadata: None,
                    error: Some(error),
                }
            }
        }
    }

    async fn answer(
        &self,
        query: &str,
        research: &ResearchResult,
        style: &Style,
    ) -> Result<ResearchReport, PipelineError> {
        self.coordinator.send_progress(ResearchProgress::Drafting);
        let draft = self.answer_agent.draft_answer(query, research).await?;
        self.coordinator
            .send_progress(ResearchProgress::Refining(style.name().to_string()));
        let final_answer = self.answer_agent.refine_answer(&draft, style).await?;
        self.coordinator.send_progress(ResearchProgress::Completed);
        Ok(build_report(final_answer, research))
    }
}

#[async_trait]
impl StageRunner for ResearchManager {
    async fn run_stage(&self, stage: Stage, state: &mut WorkflowState) -> Result<(), PipelineError> {
        match stage {
            Stage::Plan => {
                state.research_plan = Some(self.coordinator.plan(&state.query).await);
            }
            Stage::Research => {
                let plan = state
                    .research_plan
                    .clone()
                    .ok_or(PipelineError::MissingInput("research plan"))?;
                let research = if plan.subtopics.is_empty() {
                    self.coordinator.execute_research(&state.query).await?
                } else {
                    self.coordinator
                        .multi_agent_research_with_plan(&state.query, self.workflow_agents, plan)
                        .await?
                };
                state.research_results = Some(research);
            }
            Stage::Draft => {
                let research = state
                    .research_results
                    .as_ref()
                    .ok_or(PipelineError::MissingInput("research results"))?;
                self.coordinator.send_progress(ResearchProgress::Drafting);
                let draft = self.answer_agent.draft_answer(&state.query, research).await?;
                state.draft_answer = Some(draft);
            }
            Stage::Refine => {
                let draft = state
                    .draft_answer
                    .as_ref()
                    .ok_or(PipelineError::MissingInput("draft answer"))?;
                self.coordinator
                    .send_progress(ResearchProgress::Refining(state.style.name().to_string()));
                let refined = self.answer_agent.refine_answer(draft, &state.style).await?;
                state.final_answer = Some(refined);
            }
        }
        Ok(())
    }
}

/// Final report: the refined answer with the draft's sources attached.
fn build_report(final_answer: FinalAnswer, research: &ResearchResult) -> ResearchReport {
    let synthesis = &research.synthesis;
    let metadata = ReportMetadata {
        research_plan: research.research_plan.clone(),
        key_findings: synthesis.key_findings.clone(),
        contradictions_gaps: synthesis.contradictions_gaps.clone(),
        top_sources: synthesis.top_source_records().into_iter().cloned().collect(),
        cited_sources: cited_sources(&final_answer.refined_answer).into_iter().collect(),
    };

    ResearchReport {
        query: final_answer.draft.query,
        answer: final_answer.refined_answer,
        style: Some(final_answer.style),
        sources: final_answer.draft.sources,
        metadata: Some(metadata),
        error: None,
    }
}
