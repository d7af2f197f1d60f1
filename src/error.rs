//! Error types shared by the research pipeline.

/// Failures talking to the text-generation backend.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("response contained no text")]
    EmptyResponse,

    #[error("missing API key: set {var}")]
    MissingApiKey { var: &'static str },

    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("call cancelled")]
    Cancelled,
}

/// Failures talking to the web-search backend.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("search timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("search cancelled")]
    Cancelled,
}

/// Why a model response could not be turned into a structured value.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoObject,

    #[error("invalid JSON object: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// The only research failure not absorbed into a fallback value.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("research cancelled")]
    Cancelled,
}

/// Failure of a pipeline step. Workflow stages record it in the shared state;
/// the direct pipeline returns it to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("missing {0} from an earlier stage")]
    MissingInput(&'static str),

    #[error(transparent)]
    Research(#[from] ResearchError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl LlmError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}
