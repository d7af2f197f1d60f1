use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

const OLLAMA_DEFAULT_MODEL: &str = "llama3.1";
const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Gemini,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_host")]
    pub host: String,
    /// Unset means the provider's default model.
    #[serde(default)]
    pub model: Option<String>,
    /// Model for planning and synthesis; falls back to `model`.
    #[serde(default)]
    pub research_model: Option<String>,
    /// Model for drafting and refining; falls back to `model`.
    #[serde(default)]
    pub answer_model: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            provider: Provider::default(),
            host: default_host(),
            model: None,
            research_model: None,
            answer_model: None,
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.provider {
            Provider::Ollama => OLLAMA_DEFAULT_MODEL,
            Provider::Gemini => GEMINI_DEFAULT_MODEL,
        })
    }

    pub fn research_model(&self) -> &str {
        self.research_model.as_deref().unwrap_or_else(|| self.model())
    }

    pub fn answer_model(&self) -> &str {
        self.answer_model.as_deref().unwrap_or_else(|| self.model())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub max_results: u32,
    pub default_depth: u8,
    pub main_depth: u8,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            endpoint: default_search_endpoint(),
            max_results: 5,
            default_depth: 1,
            main_depth: 2,
            api_key: None,
        }
    }
}

/// How per-agent lists are combined after a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Concat,
    Dedup,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub default_agents: usize,
    pub max_agents: usize,
    pub workflow_agents: usize,
    pub excerpt_chars: usize,
    pub prompt_source_limit: usize,
    pub subtopic_search_limit: usize,
    pub merge_strategy: MergeStrategy,
    pub call_timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        ResearchConfig {
            default_agents: 2,
            max_agents: 5,
            workflow_agents: 3,
            excerpt_chars: 1000,
            prompt_source_limit: 10,
            subtopic_search_limit: 3,
            merge_strategy: MergeStrategy::default(),
            call_timeout_secs: 120,
        }
    }
}

impl ResearchConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

impl Config {
    /// Load from the default location, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        let mut config = if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), "error parsing config: {e}; using defaults");
                        Config::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), "error reading config: {e}; using defaults");
                    Config::default()
                }
            }
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values from the environment; `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = non_empty("DEEP_RESEARCH_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "ollama" => self.llm.provider = Provider::Ollama,
                "gemini" => self.llm.provider = Provider::Gemini,
                other => tracing::warn!("unknown provider '{other}' in DEEP_RESEARCH_PROVIDER, ignoring"),
            }
        }
        if let Some(host) = non_empty("OLLAMA_HOST") {
            self.llm.host = host;
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            if self.llm.provider == Provider::Ollama {
                self.llm.model = Some(model);
            }
        }
        if self.llm.provider == Provider::Gemini {
            self.llm.api_key = non_empty("GEMINI_API_KEY");
        }
        self.search.api_key = non_empty("TAVILY_API_KEY");
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/deep-research")
        } else {
            PathBuf::from(".")
        }
    }
}
