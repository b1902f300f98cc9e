pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod fewshot;
pub mod judge;
pub mod providers;
pub mod record;
pub mod types;

pub use error::{EvalError, LLMError};
pub use evaluator::{
    compare_outputs, TrajectoryEvaluator, CORRECTNESS_KEY, FINAL_STATE_KEY, STEP_RATIO_KEY,
    TRAJECTORY_KEY,
};
pub use judge::{
    build_judge, AnswerJudge, JudgeConfig, JudgeVerdict, OutputEvaluation, QaMathJudge,
    ReferenceGradedJudge, VerdictPolicy, DEFAULT_JUDGE_MODEL,
};
pub use providers::LLMProvider;
pub use record::{
    EvaluationResult, Example, ExampleInputs, ExampleOutputs, IntermediateStep, Run, RunInputs,
    RunOutputs, ToolAction,
};
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, FunctionCall, MessageRole, TokenUsage,
    ToolCall,
};
