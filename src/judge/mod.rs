use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{EvalError, LLMError},
    providers::{
        openai::{OpenAI, OpenAIConfig},
        LLMProvider,
    },
    types::{ChatMessage, CompletionRequest},
};

pub mod prompts;

pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4";

const DEFAULT_JUDGE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_JUDGE_RETRIES: u32 = 1;
const DEFAULT_JUDGE_SEED: u64 = 42;

/// How the final answer of a run is graded against the example's reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEvaluation {
    /// Generic reference-graded QA judge; receives the question.
    #[default]
    Qa,
    /// Same judge with a prompt tuned for altered-rules math answers.
    QaMath,
    /// Skip output grading entirely.
    None,
    /// Question-free judge: reference and prediction only, single-word verdict.
    QaMathWithoutQuestion,
}

impl OutputEvaluation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::QaMath => "qa_math",
            Self::None => "none",
            Self::QaMathWithoutQuestion => "qa_math_without_question",
        }
    }
}

impl fmt::Display for OutputEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputEvaluation {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qa" => Ok(Self::Qa),
            "qa_math" => Ok(Self::QaMath),
            "none" => Ok(Self::None),
            "qa_math_without_question" => Ok(Self::QaMathWithoutQuestion),
            other => Err(EvalError::UnsupportedJudgeMode(other.to_string())),
        }
    }
}

/// The outcome of one judging call: a binary score and the identifier of the
/// call that produced it, for traceability.
#[derive(Debug, Clone)]
pub struct JudgeVerdict {
    pub score: f64,
    pub run_id: Uuid,
}

/// Scores a predicted answer against a reference answer.
#[async_trait]
pub trait AnswerJudge: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the judge's prompt includes the original question.
    fn requires_question(&self) -> bool {
        false
    }

    async fn judge(
        &self,
        prediction: &str,
        reference: &str,
        question: Option<&str>,
    ) -> Result<JudgeVerdict, EvalError>;
}

/// How a raw model reply is mapped to a CORRECT/not-CORRECT verdict.
///
/// `Strict` is the legacy behavior: the reply must begin with the literal
/// token `CORRECT`. Anything else, including a lowercase verdict or preamble
/// text, scores 0.
#[derive(Debug, Clone, Default)]
pub enum VerdictPolicy {
    #[default]
    Strict,
    /// Ignore leading whitespace and letter case.
    Lenient,
    /// Score 1 when the pattern matches the reply.
    Pattern(Regex),
}

impl VerdictPolicy {
    fn accepts(&self, reply: &str) -> bool {
        match self {
            Self::Strict => reply.starts_with("CORRECT"),
            Self::Lenient => reply
                .trim_start()
                .get(..7)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("CORRECT")),
            Self::Pattern(pattern) => pattern.is_match(reply),
        }
    }
}

/// Question-free answer judge. Sends the reference and the prediction to the
/// model and reads a single-word verdict from the reply. Malformed or empty
/// replies score 0, never error.
pub struct QaMathJudge {
    provider: Arc<dyn LLMProvider>,
    model: String,
    policy: VerdictPolicy,
}

impl QaMathJudge {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: DEFAULT_JUDGE_MODEL.to_string(),
            policy: VerdictPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_policy(mut self, policy: VerdictPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl AnswerJudge for QaMathJudge {
    fn name(&self) -> &'static str {
        "qa_math_without_question"
    }

    async fn judge(
        &self,
        prediction: &str,
        reference: &str,
        _question: Option<&str>,
    ) -> Result<JudgeVerdict, EvalError> {
        let prompt = prompts::render_qa_math_without_question(reference, prediction)?;
        let request = CompletionRequest::new(self.model.clone(), vec![ChatMessage::user(prompt)])
            .with_temperature(0.0)
            .with_seed(DEFAULT_JUDGE_SEED);

        let response = self.provider.complete(request).await.map_err(EvalError::Judge)?;
        let reply = response.message.text().unwrap_or_default();
        let score = if self.policy.accepts(reply) { 1.0 } else { 0.0 };
        let run_id = Uuid::new_v4();
        tracing::debug!(judge = self.name(), %run_id, score, "judge verdict");

        Ok(JudgeVerdict { score, run_id })
    }
}

/// Question-aware reference-graded judge. The prompt follows the
/// teacher-grading format and ends with `GRADE:`; the verdict is read from
/// wherever in the reply the grade word appears. `INCORRECT` is checked
/// first since `CORRECT` is its substring.
pub struct ReferenceGradedJudge {
    provider: Arc<dyn LLMProvider>,
    model: String,
    template: &'static str,
}

impl ReferenceGradedJudge {
    pub fn qa(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: DEFAULT_JUDGE_MODEL.to_string(),
            template: "qa",
        }
    }

    pub fn qa_math(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: DEFAULT_JUDGE_MODEL.to_string(),
            template: "qa_math",
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn parse_grade(reply: &str) -> f64 {
        let upper = reply.to_ascii_uppercase();
        if upper.contains("INCORRECT") {
            0.0
        } else if upper.contains("CORRECT") {
            1.0
        } else {
            0.0
        }
    }
}

#[async_trait]
impl AnswerJudge for ReferenceGradedJudge {
    fn name(&self) -> &'static str {
        self.template
    }

    fn requires_question(&self) -> bool {
        true
    }

    async fn judge(
        &self,
        prediction: &str,
        reference: &str,
        question: Option<&str>,
    ) -> Result<JudgeVerdict, EvalError> {
        let question = question.ok_or(EvalError::MissingQuestion(self.name()))?;
        let prompt = prompts::render_grading(self.template, question, reference, prediction)?;
        let request = CompletionRequest::new(self.model.clone(), vec![ChatMessage::user(prompt)])
            .with_temperature(0.0)
            .with_seed(DEFAULT_JUDGE_SEED);

        let response = self.provider.complete(request).await.map_err(EvalError::Judge)?;
        let reply = response.message.text().unwrap_or_default();
        let score = Self::parse_grade(reply);
        let run_id = Uuid::new_v4();
        tracing::debug!(judge = self.name(), %run_id, score, "judge verdict");

        Ok(JudgeVerdict { score, run_id })
    }
}

/// Configuration for constructing a judge. Errors are reported here, at
/// construction time, not during evaluation.
#[derive(Clone)]
pub struct JudgeConfig {
    mode: OutputEvaluation,
    provider: Option<Arc<dyn LLMProvider>>,
    model: String,
    policy: VerdictPolicy,
}

impl JudgeConfig {
    pub fn new(mode: OutputEvaluation) -> Self {
        Self {
            mode,
            provider: None,
            model: DEFAULT_JUDGE_MODEL.to_string(),
            policy: VerdictPolicy::default(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_policy(mut self, policy: VerdictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the judge, or `None` for mode `none`. Supplying a provider
    /// together with mode `none` is rejected since no judging occurs.
    pub fn build(self) -> Result<Option<Arc<dyn AnswerJudge>>, EvalError> {
        if self.mode == OutputEvaluation::None {
            if self.provider.is_some() {
                return Err(EvalError::ConflictingJudgeConfig);
            }
            return Ok(None);
        }

        let provider: Arc<dyn LLMProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(default_judge_provider()?),
        };

        let judge: Arc<dyn AnswerJudge> = match self.mode {
            OutputEvaluation::Qa => {
                Arc::new(ReferenceGradedJudge::qa(provider).with_model(self.model))
            }
            OutputEvaluation::QaMath => {
                Arc::new(ReferenceGradedJudge::qa_math(provider).with_model(self.model))
            }
            OutputEvaluation::QaMathWithoutQuestion => Arc::new(
                QaMathJudge::new(provider)
                    .with_model(self.model)
                    .with_policy(self.policy),
            ),
            OutputEvaluation::None => unreachable!("handled above"),
        };

        Ok(Some(judge))
    }
}

/// Shorthand for [`JudgeConfig`] with default model and verdict policy.
pub fn build_judge(
    mode: OutputEvaluation,
    provider: Option<Arc<dyn LLMProvider>>,
) -> Result<Option<Arc<dyn AnswerJudge>>, EvalError> {
    let mut config = JudgeConfig::new(mode);
    if let Some(provider) = provider {
        config = config.with_provider(provider);
    }
    config.build()
}

/// Deterministic-decoding judge client: bounded timeout, one retry. The
/// request-level knobs (temperature 0, fixed seed) are set per judging call.
fn default_judge_provider() -> Result<OpenAI, LLMError> {
    let config = OpenAIConfig::from_env()?
        .with_timeout(DEFAULT_JUDGE_TIMEOUT)
        .with_max_retries(DEFAULT_JUDGE_RETRIES);
    OpenAI::from_config(config)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::CompletionResponse;

    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LLMError> {
            let reply = {
                let mut guard = self.replies.lock().unwrap();
                if guard.is_empty() {
                    return Err(LLMError::Provider("no more scripted replies".to_string()));
                }
                guard.remove(0)
            };

            Ok(CompletionResponse {
                message: ChatMessage::assistant(reply),
                usage: None,
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn question_free_judge_accepts_correct_prefix() {
        let judge = QaMathJudge::new(ScriptedProvider::new(vec!["CORRECT because equal"]));
        let verdict = judge.judge("42", "42", None).await.unwrap();
        assert_eq!(verdict.score, 1.0);
    }

    #[tokio::test]
    async fn question_free_judge_rejects_other_replies() {
        let judge = QaMathJudge::new(ScriptedProvider::new(vec!["INCORRECT"]));
        let verdict = judge.judge("41", "42", None).await.unwrap();
        assert_eq!(verdict.score, 0.0);
    }

    #[tokio::test]
    async fn strict_policy_fails_closed_on_preamble_and_case() {
        for reply in ["Sure! CORRECT", "correct", ""] {
            let judge = QaMathJudge::new(ScriptedProvider::new(vec![reply]));
            let verdict = judge.judge("42", "42", None).await.unwrap();
            assert_eq!(verdict.score, 0.0, "reply {reply:?} should not pass strict policy");
        }
    }

    #[tokio::test]
    async fn lenient_policy_ignores_whitespace_and_case() {
        let judge = QaMathJudge::new(ScriptedProvider::new(vec!["  Correct."]))
            .with_policy(VerdictPolicy::Lenient);
        let verdict = judge.judge("42", "42", None).await.unwrap();
        assert_eq!(verdict.score, 1.0);
    }

    #[tokio::test]
    async fn pattern_policy_matches_anywhere() {
        let judge = QaMathJudge::new(ScriptedProvider::new(vec!["The verdict is: CORRECT"]))
            .with_policy(VerdictPolicy::Pattern(Regex::new(r"\bCORRECT\b").unwrap()));
        let verdict = judge.judge("42", "42", None).await.unwrap();
        assert_eq!(verdict.score, 1.0);
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let judge = QaMathJudge::new(ScriptedProvider::new(vec![]));
        let error = judge.judge("42", "42", None).await.unwrap_err();
        assert!(matches!(error, EvalError::Judge(LLMError::Provider(_))));
    }

    #[tokio::test]
    async fn graded_judge_requires_question() {
        let judge = ReferenceGradedJudge::qa(ScriptedProvider::new(vec!["GRADE: CORRECT"]));
        let error = judge.judge("4", "4", None).await.unwrap_err();
        assert!(matches!(error, EvalError::MissingQuestion("qa")));

        let verdict = judge.judge("4", "4", Some("What is 2 + 2?")).await.unwrap();
        assert_eq!(verdict.score, 1.0);
    }

    #[test]
    fn grade_parsing_checks_incorrect_first() {
        assert_eq!(ReferenceGradedJudge::parse_grade("GRADE: INCORRECT"), 0.0);
        assert_eq!(ReferenceGradedJudge::parse_grade("GRADE: CORRECT"), 1.0);
        assert_eq!(ReferenceGradedJudge::parse_grade("grade: correct"), 1.0);
        assert_eq!(ReferenceGradedJudge::parse_grade("no verdict here"), 0.0);
    }

    #[test]
    fn mode_round_trips_through_strings() {
        for mode in [
            OutputEvaluation::Qa,
            OutputEvaluation::QaMath,
            OutputEvaluation::None,
            OutputEvaluation::QaMathWithoutQuestion,
        ] {
            assert_eq!(mode.as_str().parse::<OutputEvaluation>().unwrap(), mode);
        }
        assert!(matches!(
            "qa_maths".parse::<OutputEvaluation>(),
            Err(EvalError::UnsupportedJudgeMode(_))
        ));
    }

    #[test]
    fn none_mode_with_provider_is_rejected() {
        let provider = ScriptedProvider::new(vec![]);
        let error = build_judge(OutputEvaluation::None, Some(provider))
            .err()
            .unwrap();
        assert!(matches!(error, EvalError::ConflictingJudgeConfig));
    }

    #[test]
    fn none_mode_without_provider_builds_no_judge() {
        let judge = build_judge(OutputEvaluation::None, None).unwrap();
        assert!(judge.is_none());
    }

    #[test]
    fn explicit_provider_builds_each_judging_mode() {
        for mode in [
            OutputEvaluation::Qa,
            OutputEvaluation::QaMath,
            OutputEvaluation::QaMathWithoutQuestion,
        ] {
            let provider = ScriptedProvider::new(vec![]);
            let judge = build_judge(mode, Some(provider)).unwrap().unwrap();
            assert_eq!(judge.name(), mode.as_str());
        }
    }
}
