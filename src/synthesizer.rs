use crate::call::CallPolicy;
use crate::extract::parse_or_else;
use crate::llm::{generate_with, LlmClient};
use crate::planner::RESEARCH_SYSTEM_PROMPT;
use crate::sources::{excerpt, merge_unique};
use crate::types::{ResearchPlan, SearchResult, Synthesis};
use std::sync::Arc;

#[derive(Clone)]
pub struct ResearchSynthesizer {
    llm: Arc<dyn LlmClient>,
    policy: CallPolicy,
    excerpt_chars: usize,
    prompt_source_limit: usize,
}

impl ResearchSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, policy: CallPolicy, excerpt_chars: usize, prompt_source_limit: usize) -> Self {
        Self {
            llm,
            policy,
            excerpt_chars,
            prompt_source_limit,
        }
    }

    fn synthesis_prompt(&self, query: &str, source_excerpts: &str, plan: &ResearchPlan) -> String {
        format!(
            "I've researched the topic: \"{query}\"

Here are excerpts from the most relevant sources:

{source_excerpts}

Based on these sources, please provide:
1. A comprehensive summary of the key findings
2. The main points related to each of these subtopics: {subtopics}
3. Any contradictions or knowledge gaps you identified
4. The numbers of the most credible sources above

Format your response as JSON with the following structure:
{{
  \"summary\": \"comprehensive summary here\",
  \"key_findings\": [\"finding1\", \"finding2\", ...],
  \"subtopic_analysis\": {{\"subtopic1\": \"analysis1\", ...}},
  \"contradictions_gaps\": [\"contradiction1\", \"gap1\", ...],
  \"top_sources\": [1, 4, 7]
}}",
            subtopics = plan.subtopics.join(", ")
        )
    }

    /// Distill `results` into a [`Synthesis`] carrying every unique source.
    ///
    /// Only the first `prompt_source_limit` sources are shown to the model.
    /// If the model fails or its reply has no usable JSON, the summary is the
    /// concatenation of the raw search answers.
    pub async fn synthesize(&self, query: &str, results: &[SearchResult], plan: &ResearchPlan) -> Synthesis {
        let mut all_sources = Vec::new();
        let mut all_answers: Vec<&str> = Vec::new();
        for result in results {
            merge_unique(&mut all_sources, &result.sources);
            if !result.answer.is_empty() {
                all_answers.push(&result.answer);
            }
        }

        let source_excerpts = all_sources
            .iter()
            .take(self.prompt_source_limit)
            .enumerate()
            .map(|(i, source)| {
                let title = if source.title.is_empty() { "Untitled" } else { source.title.as_str() };
                format!("Source {}: {}\n{}", i + 1, title, excerpt(&source.content, self.excerpt_chars))
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = self.synthesis_prompt(query, &source_excerpts, plan);
        let response = generate_with(self.llm.as_ref(), &self.policy, RESEARCH_SYSTEM_PROMPT, &prompt).await;

        let mut synthesis = match response {
            Ok(text) => parse_or_else(&text, |e| {
                tracing::debug!(query, "unusable synthesis: {e}");
                Synthesis::fallback(&all_answers)
            }),
            Err(e) => {
                tracing::warn!(query, "synthesis failed: {e}");
                Synthesis::fallback(&all_answers)
            }
        };

        tracing::info!(
            query,
            sources = all_sources.len(),
            findings = synthesis.key_findings.len(),
            "synthesis complete"
        );
        synthesis.sources = all_sources;
        synthesis
    }
}
