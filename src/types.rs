use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A single web result as returned by the search backend.
///
/// Equality is structural over every field, provider extras included; there
/// is no stable identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceRecord {
    #[cfg(test)]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Normalized output of one search call. `error` is set when the call failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceRecord>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub research_questions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub subtopics: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub search_terms: Vec<String>,
}

impl ResearchPlan {
    /// The plan used when the model gives nothing usable back.
    pub fn single_question(query: &str) -> Self {
        Self {
            research_questions: vec![query.to_string()],
            subtopics: Vec::new(),
            search_terms: vec![query.to_string()],
        }
    }
}

/// Model output is loosely typed: scalars and nested values are rendered as
/// text instead of failing the whole object.
fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    })
}

fn lenient_analysis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IndexMap<String, String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(subtopic, analysis)| value_text(analysis).map(|text| (subtopic, text)))
            .collect(),
        _ => IndexMap::new(),
    })
}

/// Integers and numeric strings are kept; anything else is dropped.
fn lenient_indices<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<usize>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

fn lenient_sources<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SourceRecord>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Structured distillation of the search results for one research task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub key_findings: Vec<String>,
    /// Keeps the order the model listed subtopics in.
    #[serde(default, deserialize_with = "lenient_analysis")]
    pub subtopic_analysis: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub contradictions_gaps: Vec<String>,
    /// 1-based positions into `sources`, as reported by the model. Not validated.
    #[serde(default, deserialize_with = "lenient_indices")]
    pub top_sources: Vec<usize>,
    #[serde(default, deserialize_with = "lenient_sources")]
    pub sources: Vec<SourceRecord>,
}

impl Synthesis {
    /// Minimal synthesis carrying only the concatenated search answers.
    pub fn fallback(answers: &[&str]) -> Self {
        Self {
            summary: answers.join(" "),
            ..Default::default()
        }
    }

    /// Resolves `top_sources` against `sources`, skipping indices that point
    /// outside the list.
    pub fn top_source_records(&self) -> Vec<&SourceRecord> {
        self.top_sources
            .iter()
            .filter_map(|&idx| idx.checked_sub(1).and_then(|i| self.sources.get(i)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub query: String,
    pub research_plan: ResearchPlan,
    pub raw_search_results: Vec<SearchResult>,
    pub synthesis: Synthesis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAnswer {
    pub query: String,
    pub draft_answer: String,
    pub sources: Vec<SourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    #[serde(flatten)]
    pub draft: DraftAnswer,
    pub refined_answer: String,
    pub style: String,
}

/// Tone profile applied when rewriting a drafted answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Style {
    #[default]
    Academic,
    Business,
    Educational,
    Journalistic,
    /// Any other value; the raw text doubles as its own description.
    Custom(String),
}

impl Style {
    pub const NAMES: [&'static str; 4] = ["academic", "business", "educational", "journalistic"];

    pub fn name(&self) -> &str {
        match self {
            Style::Academic => "academic",
            Style::Business => "business",
            Style::Educational => "educational",
            Style::Journalistic => "journalistic",
            Style::Custom(raw) => raw,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Style::Academic => "formal, rigorous, with proper citations and methodology discussion",
            Style::Business => "concise, practical, with actionable insights and executive summary",
            Style::Educational => {
                "clear, pedagogical, with examples and explanations of complex concepts"
            }
            Style::Journalistic => "balanced, engaging, with quotes and contemporary context",
            Style::Custom(raw) => raw,
        }
    }
}

impl FromStr for Style {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "academic" => Style::Academic,
            "business" => Style::Business,
            "educational" => Style::Educational,
            "journalistic" => Style::Journalistic,
            _ => Style::Custom(s.to_string()),
        })
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata attached to a successful report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub research_plan: ResearchPlan,
    pub key_findings: Vec<String>,
    pub contradictions_gaps: Vec<String>,
    pub top_sources: Vec<SourceRecord>,
    pub cited_sources: Vec<usize>,
}

/// What the CLI prints and optionally writes to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub query: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReportMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
