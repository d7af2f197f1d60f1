use crate::call::CallPolicy;
use crate::extract::parse_or_else;
use crate::llm::{generate_with, LlmClient};
use crate::types::ResearchPlan;
use std::sync::Arc;

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are an expert research agent. You gather comprehensive information on a topic by:
1. Breaking complex queries down into specific research questions
2. Identifying the key subtopics worth exploring
3. Finding reliable and relevant sources
4. Extracting and summarizing the most important information
5. Organizing findings in a structured format

Be thorough, objective, and precise. Focus on factual information and cite every source.";

/// Asks the model to decompose a query into questions, subtopics and search terms.
#[derive(Clone)]
pub struct PlanGenerator {
    llm: Arc<dyn LlmClient>,
    policy: CallPolicy,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, policy: CallPolicy) -> Self {
        Self { llm, policy }
    }

    fn plan_prompt(query: &str) -> String {
        format!(
            "I need to research: \"{query}\"

Please help me create a research plan by:
1. Breaking this topic into 3-5 specific research questions
2. Identifying 3-7 key subtopics to explore
3. Suggesting search terms that would yield the most relevant results

Format your response as JSON with the following structure:
{{
  \"research_questions\": [\"question1\", \"question2\", ...],
  \"subtopics\": [\"subtopic1\", \"subtopic2\", ...],
  \"search_terms\": [\"term1\", \"term2\", ...]
}}"
        )
    }

    /// Never fails: any model or parse failure yields a single-question plan.
    pub async fn generate(&self, query: &str) -> ResearchPlan {
        let response = generate_with(
            self.llm.as_ref(),
            &self.policy,
            RESEARCH_SYSTEM_PROMPT,
            &Self::plan_prompt(query),
        )
        .await;

        let mut plan = match response {
            Ok(text) => parse_or_else(&text, |e| {
                tracing::debug!(query, "unusable research plan: {e}");
                ResearchPlan::single_question(query)
            }),
            Err(e) if e.is_cancelled() => {
                tracing::debug!(query, "plan generation cancelled");
                ResearchPlan::single_question(query)
            }
            Err(e) => {
                tracing::warn!(query, "plan generation failed: {e}");
                ResearchPlan::single_question(query)
            }
        };

        if plan.research_questions.is_empty() {
            plan.research_questions.push(query.to_string());
        }

        tracing::info!(
            query,
            questions = plan.research_questions.len(),
            subtopics = plan.subtopics.len(),
            "research plan ready"
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use pretty_assertions::assert_eq;

    fn planner(llm: &ScriptedLlm) -> PlanGenerator {
        PlanGenerator::new(Arc::new(llm.clone()), CallPolicy::default())
    }

    #[tokio::test]
    async fn test_parses_embedded_plan() {
        let llm = ScriptedLlm::new(
            "Here you go:\n{\"research_questions\": [\"Which jobs change?\"], \"subtopics\": [\"automation\", \"wages\"], \"search_terms\": [\"AI jobs\"]}",
        );
        let plan = planner(&llm).generate("impact of AI on jobs").await;
        assert_eq!(plan.research_questions, vec!["Which jobs change?"]);
        assert_eq!(plan.subtopics, vec!["automation", "wages"]);
        assert_eq!(plan.search_terms, vec!["AI jobs"]);
        assert!(llm.prompts()[0].contains("\"impact of AI on jobs\""));
    }

    #[tokio::test]
    async fn test_prose_falls_back_to_single_question() {
        let llm = ScriptedLlm::new("I cannot produce JSON today.");
        let plan = planner(&llm).generate("quantum batteries").await;
        assert_eq!(plan, ResearchPlan::single_question("quantum batteries"));
    }

    #[tokio::test]
    async fn test_model_failure_falls_back() {
        let llm = ScriptedLlm::new("").with_failure("research plan", "quota exceeded");
        let plan = planner(&llm).generate("q").await;
        assert_eq!(plan, ResearchPlan::single_question("q"));
    }

    #[tokio::test]
    async fn test_questions_never_empty() {
        for reply in ["{}", "{\"research_questions\": []}", "", "{ not json }"] {
            let llm = ScriptedLlm::new(reply);
            let plan = planner(&llm).generate("edge").await;
            assert!(!plan.research_questions.is_empty(), "reply: {reply}");
        }
    }
}
