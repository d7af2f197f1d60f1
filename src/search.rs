use crate::call::{CallPolicy, Interrupted};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::sources::merge_unique;
use crate::types::{SearchResult, SourceRecord};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// What the search backend hands back before normalization.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub answer: Option<String>,
    pub sources: Vec<SourceRecord>,
    pub raw: Value,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, depth: u8, max_results: u32) -> Result<SearchResponse, SearchError>;
}

/// Tavily search API.
pub struct TavilyClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl TavilyClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    fn depth_name(depth: u8) -> &'static str {
        match depth.clamp(1, 3) {
            1 => "basic",
            _ => "advanced",
        }
    }

    fn request_body(query: &str, depth: u8, max_results: u32) -> Value {
        serde_json::json!({
            "query": query,
            "search_depth": Self::depth_name(depth),
            "max_results": max_results,
            "include_answer": true,
            "include_images": false,
            "include_raw_content": true,
        })
    }

    fn parse_response(data: Value) -> SearchResponse {
        let answer = data
            .get("answer")
            .and_then(Value::as_str)
            .map(str::to_string);
        let sources = data
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        SearchResponse {
            answer,
            sources,
            raw: data,
        }
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, query: &str, depth: u8, max_results: u32) -> Result<SearchResponse, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(query, depth, max_results))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = response.json().await?;
        Ok(Self::parse_response(data))
    }
}

/// Wraps the search backend so callers always get a [`SearchResult`]; failures
/// come back in-band through its `error` field.
#[derive(Clone)]
pub struct SourceFetcher {
    client: Arc<dyn SearchClient>,
    policy: CallPolicy,
    default_depth: u8,
    max_results: u32,
}

impl SourceFetcher {
    pub fn new(client: Arc<dyn SearchClient>, policy: CallPolicy, config: &SearchConfig) -> Self {
        Self {
            client,
            policy,
            default_depth: config.default_depth,
            max_results: config.max_results,
        }
    }

    pub fn default_depth(&self) -> u8 {
        self.default_depth
    }

    pub async fn fetch(&self, query: &str, depth: u8) -> SearchResult {
        let depth = depth.clamp(1, 3);
        let outcome = match self
            .policy
            .run(self.client.search(query, depth, self.max_results))
            .await
        {
            Ok(result) => result,
            Err(Interrupted::TimedOut(secs)) => Err(SearchError::Timeout { secs }),
            Err(Interrupted::Cancelled) => Err(SearchError::Cancelled),
        };

        match outcome {
            Ok(response) => {
                tracing::debug!(query, depth, sources = response.sources.len(), "search complete");
                SearchResult {
                    query: query.to_string(),
                    answer: response.answer.unwrap_or_default(),
                    sources: response.sources,
                    raw: response.raw,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(query, "search failed: {e}");
                SearchResult {
                    query: query.to_string(),
                    answer: format!("Error occurred during search: {e}"),
                    sources: Vec::new(),
                    raw: Value::Null,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Search the main query deeply plus one search per subtopic, and fold the
    /// results into one.
    pub async fn deep_search(&self, query: &str, subtopics: &[String], main_depth: u8) -> SearchResult {
        let main = self.fetch(query, main_depth).await;
        let mut results = vec![main];
        for subtopic in subtopics {
            let sub_query = format!("{query} {subtopic}");
            results.push(self.fetch(&sub_query, self.default_depth).await);
        }

        let mut sources = Vec::new();
        let mut answer = results[0].answer.clone();
        for result in &results {
            merge_unique(&mut sources, &result.sources);
            if !result.answer.is_empty() && result.answer != answer {
                answer.push_str("\n\nAdditional information: ");
                answer.push_str(&result.answer);
            }
        }

        SearchResult {
            query: query.to_string(),
            answer,
            sources,
            raw: serde_json::json!({ "subtopics": subtopics }),
            error: results[0].error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticSearch;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fetcher(search: StaticSearch) -> SourceFetcher {
        SourceFetcher::new(Arc::new(search), CallPolicy::default(), &SearchConfig::default())
    }

    #[test]
    fn test_depth_mapping() {
        assert_eq!(TavilyClient::depth_name(0), "basic");
        assert_eq!(TavilyClient::depth_name(1), "basic");
        assert_eq!(TavilyClient::depth_name(2), "advanced");
        assert_eq!(TavilyClient::depth_name(9), "advanced");
        let body = TavilyClient::request_body("q", 2, 5);
        assert_eq!(body["include_answer"], true);
        assert_eq!(body["max_results"], 5);
    }

    #[test]
    fn test_parse_response() {
        let data = serde_json::json!({
            "answer": "short answer",
            "results": [
                {"title": "A", "url": "u1", "content": "c", "score": 0.7},
                "garbage"
            ]
        });
        let parsed = TavilyClient::parse_response(data);
        assert_eq!(parsed.answer.as_deref(), Some("short answer"));
        assert_eq!(parsed.sources.len(), 1);
        assert_eq!(parsed.sources[0].url, "u1");
    }

    #[tokio::test]
    async fn test_fetch_normalizes_success() {
        let search = StaticSearch::new().with_answer("q", "42");
        let result = fetcher(search.clone()).fetch("q", 2).await;
        assert_eq!(result.answer, "42");
        assert_eq!(result.sources, vec![SourceRecord::new("A", "u1")]);
        assert!(result.error.is_none());
        assert_eq!(search.queries(), vec![("q".to_string(), 2)]);
    }

    struct StalledSearch;

    #[async_trait]
    impl SearchClient for StalledSearch {
        async fn search(&self, _query: &str, _depth: u8, _max_results: u32) -> Result<SearchResponse, SearchError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(SearchResponse::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_absorbs_timeout() {
        let policy = CallPolicy::new(Duration::from_secs(5), CancellationToken::new());
        let fetcher = SourceFetcher::new(Arc::new(StalledSearch), policy, &SearchConfig::default());
        let result = fetcher.fetch("slow", 1).await;

        assert_eq!(result.error.as_deref(), Some("search timed out after 5s"));
        assert_eq!(result.answer, "Error occurred during search: search timed out after 5s");
        assert!(result.sources.is_empty());
        assert_eq!(result.raw, Value::Null);
    }

    #[tokio::test]
    async fn test_fetch_absorbs_failure() {
        let search = StaticSearch::new().failing();
        let result = fetcher(search).fetch("q", 1).await;
        assert!(result.sources.is_empty());
        assert!(result.error.is_some());
        assert!(result.answer.starts_with("Error occurred during search:"));
    }

    #[tokio::test]
    async fn test_deep_search_folds_results() {
        let search = StaticSearch::new()
            .with_answer("q", "main")
            .with_answer("q costs", "cheap");
        let result = fetcher(search.clone())
            .deep_search("q", &["costs".to_string(), "risks".to_string()], 2)
            .await;
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.answer, "main\n\nAdditional information: cheap");
        assert_eq!(search.queries().len(), 3);
    }
}
