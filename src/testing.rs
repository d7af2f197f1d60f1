//! Scripted stand-ins for the model and search backends.

use crate::error::{LlmError, SearchError};
use crate::llm::LlmClient;
use crate::search::{SearchClient, SearchResponse};
use crate::types::SourceRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct LlmScript {
    default: String,
    rules: Mutex<Vec<(String, Result<String, String>)>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

/// Replies with the first rule whose needle occurs in the user prompt.
#[derive(Clone)]
pub struct ScriptedLlm {
    script: Arc<LlmScript>,
}

impl ScriptedLlm {
    pub fn new(default: &str) -> Self {
        Self {
            script: Arc::new(LlmScript {
                default: default.to_string(),
                rules: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_reply(self, needle: &str, reply: &str) -> Self {
        self.script
            .rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Ok(reply.to_string())));
        self
    }

    pub fn with_failure(self, needle: &str, message: &str) -> Self {
        self.script
            .rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script.prompts.lock().unwrap().clone()
    }

    pub fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.contains(needle))
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .prompts
            .lock()
            .unwrap()
            .push(user_prompt.to_string());

        let rules = self.script.rules.lock().unwrap();
        let reply = rules
            .iter()
            .find(|(needle, _)| user_prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Ok(self.script.default.clone()));

        reply.map_err(|body| LlmError::Api {
            provider: "Scripted",
            status: 500,
            body,
        })
    }
}

struct SearchScript {
    sources: Vec<SourceRecord>,
    answers: HashMap<String, String>,
    failing: bool,
    panic_on: Option<String>,
    queries: Mutex<Vec<(String, u8)>>,
}

/// Returns the same source list for every query, with per-query answers.
#[derive(Clone)]
pub struct StaticSearch {
    script: Arc<SearchScript>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::with_sources(vec![SourceRecord::new("A", "u1")])
    }

    pub fn with_sources(sources: Vec<SourceRecord>) -> Self {
        Self {
            script: Arc::new(SearchScript {
                sources,
                answers: HashMap::new(),
                failing: false,
                panic_on: None,
                queries: Mutex::new(Vec::new()),
            }),
        }
    }

    fn edit(self, f: impl FnOnce(&mut SearchScript)) -> Self {
        let mut script = Arc::try_unwrap(self.script)
            .unwrap_or_else(|_| panic!("configure StaticSearch before sharing it"));
        f(&mut script);
        Self {
            script: Arc::new(script),
        }
    }

    pub fn with_answer(self, query: &str, answer: &str) -> Self {
        self.edit(|s| {
            s.answers.insert(query.to_string(), answer.to_string());
        })
    }

    pub fn failing(self) -> Self {
        self.edit(|s| s.failing = true)
    }

    /// Panic when asked for exactly `query`, to simulate a crashed task.
    pub fn panicking_on(self, query: &str) -> Self {
        self.edit(|s| s.panic_on = Some(query.to_string()))
    }

    pub fn queries(&self) -> Vec<(String, u8)> {
        self.script.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for StaticSearch {
    async fn search(&self, query: &str, depth: u8, _max_results: u32) -> Result<SearchResponse, SearchError> {
        self.script
            .queries
            .lock()
            .unwrap()
            .push((query.to_string(), depth));

        if self.script.panic_on.as_deref() == Some(query) {
            panic!("search backend crashed on {query}");
        }

        if self.script.failing {
            return Err(SearchError::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        Ok(SearchResponse {
            answer: self.script.answers.get(query).cloned(),
            sources: self.script.sources.clone(),
            raw: serde_json::json!({ "query": query }),
        })
    }
}
