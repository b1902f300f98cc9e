use thiserror::Error;

/// Errors produced by the language-model client used for judging.
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("missing API key: set the {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(&'static str),
}

/// Errors produced while evaluating a run against an example.
///
/// Validation variants are raised before any score is produced; an
/// evaluation either returns the full result list or fails as a whole.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("run outputs must contain 'intermediate_steps' or 'actual_steps'")]
    InvalidRunOutput,

    #[error("example outputs must contain 'expected_steps'")]
    MissingExpectedSteps,

    #[error("'expected_steps' must contain at least one step")]
    EmptyExpectedSteps,

    #[error("example outputs must contain a 'reference' answer when output grading is enabled")]
    MissingReference,

    #[error("the {0} judge requires a 'question' input")]
    MissingQuestion(&'static str),

    #[error("judge mode 'none' does not take a model provider")]
    ConflictingJudgeConfig,

    #[error("unsupported judge mode: {0}")]
    UnsupportedJudgeMode(String),

    #[error("judge call failed: {0}")]
    Judge(#[from] LLMError),

    #[error("prompt template error: {0}")]
    Template(#[from] handlebars::RenderError),
}
