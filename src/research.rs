use crate::config::{MergeStrategy, ResearchConfig, SearchConfig};
use crate::error::ResearchError;
use crate::planner::PlanGenerator;
use crate::search::SourceFetcher;
use crate::sources::merge_unique;
use crate::synthesizer::ResearchSynthesizer;
use crate::types::{ResearchPlan, ResearchResult, SearchResult, Synthesis};
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Hard ceiling on concurrent research tasks, whatever the config says.
pub const MAX_AGENTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ResearchProgress {
    Planning(String),
    Searching(String),
    Synthesizing(String),
    AgentsStarted(usize), // number of research tasks
    TaskCompleted(String),
    Merging,
    Drafting,
    Refining(String),
    Completed,
}

/// Runs plan → searches → synthesis for one query, and fans that out across
/// subtopics for multi-agent research.
#[derive(Clone)]
pub struct ResearchCoordinator {
    planner: PlanGenerator,
    fetcher: SourceFetcher,
    synthesizer: ResearchSynthesizer,
    cancel: CancellationToken,
    main_depth: u8,
    subtopic_search_limit: usize,
    max_agents: usize,
    merge_strategy: MergeStrategy,
    progress_tx: Option<mpsc::UnboundedSender<ResearchProgress>>,
}

impl ResearchCoordinator {
    pub fn new(
        planner: PlanGenerator,
        fetcher: SourceFetcher,
        synthesizer: ResearchSynthesizer,
        cancel: CancellationToken,
        search: &SearchConfig,
        research: &ResearchConfig,
    ) -> Self {
        Self {
            planner,
            fetcher,
            synthesizer,
            cancel,
            main_depth: search.main_depth,
            subtopic_search_limit: research.subtopic_search_limit,
            max_agents: research.max_agents.clamp(1, MAX_AGENTS),
            merge_strategy: research.merge_strategy,
            progress_tx: None,
        }
    }

    pub fn set_progress_channel(&mut self, tx: mpsc::UnboundedSender<ResearchProgress>) {
        self.progress_tx = Some(tx);
    }

    pub(crate) fn send_progress(&self, progress: ResearchProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(progress);
        }
    }

    pub async fn plan(&self, query: &str) -> ResearchPlan {
        self.send_progress(ResearchProgress::Planning(query.to_string()));
        self.planner.generate(query).await
    }

    /// Research a single query end to end.
    ///
    /// Searches run one after another: the query itself at the main depth,
    /// each distinct plan question, then the leading subtopics. Failed
    /// searches flow into synthesis like any other result; only cancellation
    /// aborts.
    pub async fn execute_research(&self, query: &str) -> Result<ResearchResult, ResearchError> {
        let plan = self.plan(query).await;
        let depth = self.fetcher.default_depth();

        self.send_progress(ResearchProgress::Searching(query.to_string()));
        let mut search_results = vec![self.fetcher.fetch(query, self.main_depth).await];

        let mut searched: Vec<&str> = vec![query];
        for question in &plan.research_questions {
            if searched.contains(&question.as_str()) {
                continue;
            }
            searched.push(question);
            search_results.push(self.fetcher.fetch(question, depth).await);
        }

        for subtopic in plan.subtopics.iter().take(self.subtopic_search_limit) {
            let sub_query = format!("{query} {subtopic}");
            search_results.push(self.fetcher.fetch(&sub_query, depth).await);
        }

        self.send_progress(ResearchProgress::Synthesizing(query.to_string()));
        let synthesis = self.synthesizer.synthesize(query, &search_results, &plan).await;

        if self.cancel.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        self.send_progress(ResearchProgress::TaskCompleted(query.to_string()));
        Ok(ResearchResult {
            query: query.to_string(),
            research_plan: plan,
            raw_search_results: search_results,
            synthesis,
        })
    }

    /// One search-only pass: the query at the main depth plus its planned
    /// subtopics, folded into a single result. No synthesis.
    pub async fn quick_search(&self, query: &str) -> Result<SearchResult, ResearchError> {
        let plan = self.plan(query).await;
        self.send_progress(ResearchProgress::Searching(query.to_string()));
        let result = self
            .fetcher
            .deep_search(query, &plan.subtopics, self.main_depth)
            .await;

        if self.cancel.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }
        self.send_progress(ResearchProgress::Completed);
        Ok(result)
    }

    /// Plan once, then research the query and up to `num_agents - 1` of its
    /// subtopics concurrently.
    pub async fn multi_agent_research(&self, query: &str, num_agents: usize) -> Result<ResearchResult, ResearchError> {
        let plan = self.plan(query).await;
        self.multi_agent_research_with_plan(query, num_agents, plan).await
    }

    /// Fan-out with an already generated plan. `num_agents` is clamped to
    /// `[1, max_agents]`; merged lists follow launch order, main query first.
    pub async fn multi_agent_research_with_plan(
        &self,
        query: &str,
        num_agents: usize,
        plan: ResearchPlan,
    ) -> Result<ResearchResult, ResearchError> {
        let num_agents = num_agents.clamp(1, self.max_agents);

        let mut task_queries = vec![query.to_string()];
        task_queries.extend(
            plan.subtopics
                .iter()
                .take(num_agents - 1)
                .map(|subtopic| format!("{query} - {subtopic}")),
        );

        tracing::info!(query, agents = task_queries.len(), "starting research agents");
        self.send_progress(ResearchProgress::AgentsStarted(task_queries.len()));

        let handles: Vec<_> = task_queries
            .iter()
            .map(|task_query| {
                let coordinator = self.clone();
                let task_query = task_query.clone();
                tokio::spawn(async move { coordinator.execute_research(&task_query).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (task_query, outcome) in task_queries.iter().zip(join_all(handles).await) {
            match outcome {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(ResearchError::Cancelled)) => return Err(ResearchError::Cancelled),
                Err(e) => {
                    tracing::warn!(query = %task_query, "research task failed: {e}");
                    results.push(placeholder_result(task_query, &e.to_string()));
                }
            }
        }

        self.send_progress(ResearchProgress::Merging);
        let synthesis = merge_syntheses(results.iter().map(|r| &r.synthesis), self.merge_strategy);
        let raw_search_results = results
            .into_iter()
            .flat_map(|r| r.raw_search_results)
            .collect();

        Ok(ResearchResult {
            query: query.to_string(),
            research_plan: plan,
            raw_search_results,
            synthesis,
        })
    }
}

/// Stand-in for a research task that died before producing a result.
fn placeholder_result(query: &str, reason: &str) -> ResearchResult {
    ResearchResult {
        query: query.to_string(),
        research_plan: ResearchPlan::single_question(query),
        raw_search_results: Vec::new(),
        synthesis: Synthesis {
            summary: format!("Research on \"{query}\" did not complete: {reason}"),
            ..Default::default()
        },
    }
}

fn extend_with(into: &mut Vec<String>, items: &[String], strategy: MergeStrategy) {
    for item in items {
        if strategy == MergeStrategy::Dedup && into.contains(item) {
            continue;
        }
        into.push(item.clone());
    }
}

/// Merge per-task syntheses.
///
/// Sources are always unioned. Findings and gaps are concatenated, or
/// deduplicated under [`MergeStrategy::Dedup`]. Summaries are joined, the
/// first analysis of a subtopic wins, and `top_sources` is cleared because
/// its indices only make sense against each task's own source list.
pub fn merge_syntheses<'a, I>(syntheses: I, strategy: MergeStrategy) -> Synthesis
where
    I: IntoIterator<Item = &'a Synthesis>,
{
    let mut merged = Synthesis::default();
    let mut summaries = Vec::new();

    for synthesis in syntheses {
        merge_unique(&mut merged.sources, &synthesis.sources);
        if !synthesis.summary.is_empty() {
            summaries.push(synthesis.summary.as_str());
        }
        extend_with(&mut merged.key_findings, &synthesis.key_findings, strategy);
        extend_with(&mut merged.contradictions_gaps, &synthesis.contradictions_gaps, strategy);
        for (subtopic, analysis) in &synthesis.subtopic_analysis {
            merged
                .subtopic_analysis
                .entry(subtopic.clone())
                .or_insert_with(|| analysis.clone());
        }
    }

    merged.summary = summaries.join("\n\n");
    merged
}
