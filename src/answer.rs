use crate::call::CallPolicy;
use crate::error::LlmError;
use crate::llm::{generate_with, LlmClient};
use crate::sources::format_sources;
use crate::types::{DraftAnswer, FinalAnswer, ResearchResult, Style};
use std::sync::Arc;

pub const ANSWER_SYSTEM_PROMPT: &str = "You are an expert answer drafter who turns research findings into comprehensive, accurate and well-structured responses. You:

1. Analyze research findings thoroughly
2. Organize information in a logical and coherent structure
3. Keep every claim accurate by citing the relevant sources
4. Present balanced perspectives on controversial topics
5. Identify limitations and areas for future research
6. Write in a clear, engaging and authoritative voice

Tailor each answer to the specific query while using all relevant research findings. Always cite sources.";

/// Drafts a cited answer from research results and restyles it.
#[derive(Clone)]
pub struct AnswerAgent {
    llm: Arc<dyn LlmClient>,
    policy: CallPolicy,
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl AnswerAgent {
    pub fn new(llm: Arc<dyn LlmClient>, policy: CallPolicy) -> Self {
        Self { llm, policy }
    }

    fn draft_prompt(query: &str, research: &ResearchResult) -> String {
        let synthesis = &research.synthesis;
        let subtopics: String = synthesis
            .subtopic_analysis
            .iter()
            .map(|(subtopic, analysis)| format!("### {subtopic}\n{analysis}\n\n"))
            .collect();

        format!(
            "I need a comprehensive answer to the query: \"{query}\"

Here's the research that has been gathered:

SUMMARY:
{summary}

KEY FINDINGS:
{findings}

SUBTOPIC ANALYSIS:
{subtopics}

CONTRADICTIONS AND KNOWLEDGE GAPS:
{gaps}

SOURCES:
{sources}

Please draft a comprehensive answer that:
1. Directly addresses the query
2. Incorporates all relevant information
3. Is well-structured with clear sections
4. Cites sources by number (using [1], [2], etc.)
5. Acknowledges any limitations or areas of uncertainty
6. Provides a balanced view where perspectives compete

Your answer should be authoritative, informative and engaging.",
            summary = synthesis.summary,
            findings = bullets(&synthesis.key_findings),
            gaps = bullets(&synthesis.contradictions_gaps),
            sources = format_sources(&synthesis.sources),
        )
    }

    fn refine_prompt(draft: &DraftAnswer, style: &Style) -> String {
        format!(
            "Please refine the following draft answer to the query: \"{query}\"

DRAFT ANSWER:
{answer}

I'd like the answer to be in a {name} style that is {description}.

Preserve all factual information and citations, but restructure and rewrite the content to match the requested style.",
            query = draft.query,
            answer = draft.draft_answer,
            name = style.name(),
            description = style.description(),
        )
    }

    /// The model's reply is taken verbatim as the draft.
    pub async fn draft_answer(&self, query: &str, research: &ResearchResult) -> Result<DraftAnswer, LlmError> {
        let prompt = Self::draft_prompt(query, research);
        let draft = generate_with(self.llm.as_ref(), &self.policy, ANSWER_SYSTEM_PROMPT, &prompt).await?;
        tracing::info!(query, chars = draft.len(), "draft answer ready");

        Ok(DraftAnswer {
            query: query.to_string(),
            draft_answer: draft,
            sources: research.synthesis.sources.clone(),
        })
    }

    /// Rewrite `draft` in `style`. Citations are not checked afterwards.
    pub async fn refine_answer(&self, draft: &DraftAnswer, style: &Style) -> Result<FinalAnswer, LlmError> {
        let prompt = Self::refine_prompt(draft, style);
        let refined = generate_with(self.llm.as_ref(), &self.policy, ANSWER_SYSTEM_PROMPT, &prompt).await?;
        tracing::info!(query = %draft.query, style = %style, "answer refined");

        Ok(FinalAnswer {
            draft: draft.clone(),
            refined_answer: refined,
            style: style.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use crate::types::{ResearchPlan, SourceRecord, Synthesis};

    fn research() -> ResearchResult {
        ResearchResult {
            query: "q".into(),
            research_plan: ResearchPlan::single_question("q"),
            raw_search_results: Vec::new(),
            synthesis: Synthesis {
                summary: "AI automates routine tasks.".into(),
                key_findings: vec!["Clerical roles shrink".into(), "New roles emerge".into()],
                subtopic_analysis: [("wages".to_string(), "Mixed evidence".to_string())].into(),
                contradictions_gaps: vec!["Long-run data is thin".into()],
                top_sources: vec![1],
                sources: vec![SourceRecord::new("A", "u1")],
            },
        }
    }

    fn agent(llm: &ScriptedLlm) -> AnswerAgent {
        AnswerAgent::new(Arc::new(llm.clone()), CallPolicy::default())
    }

    #[tokio::test]
    async fn test_draft_prompt_embeds_research() {
        let llm = ScriptedLlm::new("Routine work is shrinking [1].");
        let draft = agent(&llm).draft_answer("q", &research()).await.unwrap();

        assert_eq!(draft.draft_answer, "Routine work is shrinking [1].");
        assert_eq!(draft.sources, vec![SourceRecord::new("A", "u1")]);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("SUMMARY:\nAI automates routine tasks."));
        assert!(prompt.contains("- Clerical roles shrink\n- New roles emerge"));
        assert!(prompt.contains("### wages\nMixed evidence"));
        assert!(prompt.contains("- Long-run data is thin"));
        assert!(prompt.contains("1. A\n   URL: u1"));
    }

    #[tokio::test]
    async fn test_draft_propagates_model_failure() {
        let llm = ScriptedLlm::new("").with_failure("comprehensive answer", "quota");
        let err = agent(&llm).draft_answer("q", &research()).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { .. }));
    }

    #[tokio::test]
    async fn test_refine_uses_canned_style_description() {
        let llm = ScriptedLlm::new("Bottom line: routine work shrinks [1].");
        let draft = DraftAnswer {
            query: "q".into(),
            draft_answer: "Routine work is shrinking [1].".into(),
            sources: vec![SourceRecord::new("A", "u1")],
        };
        let refined = agent(&llm).refine_answer(&draft, &Style::Business).await.unwrap();

        assert_eq!(refined.style, "business");
        assert_eq!(refined.draft, draft);
        assert_eq!(refined.refined_answer, "Bottom line: routine work shrinks [1].");
        assert!(llm.prompts()[0].contains(
            "in a business style that is concise, practical, with actionable insights and executive summary"
        ));
    }

    #[tokio::test]
    async fn test_refine_accepts_free_text_style() {
        let llm = ScriptedLlm::new("Arr, the machines be takin' jobs [1].");
        let draft = DraftAnswer {
            query: "q".into(),
            draft_answer: "draft".into(),
            sources: Vec::new(),
        };
        let style: Style = "pirate".parse().unwrap();
        let refined = agent(&llm).refine_answer(&draft, &style).await.unwrap();

        assert_eq!(refined.style, "pirate");
        assert!(llm.prompts()[0].contains("in a pirate style that is pirate."));
    }
}
