use std::sync::Arc;

use crate::{
    error::EvalError,
    judge::{AnswerJudge, JudgeConfig, OutputEvaluation},
    providers::LLMProvider,
    record::{EvaluationResult, Example, ExampleOutputs, Run, RunInputs, RunOutputs},
};

pub const TRAJECTORY_KEY: &str = "Intermediate steps correctness";
pub const STEP_RATIO_KEY: &str = "# steps / # expected steps";
pub const FINAL_STATE_KEY: &str = "Correct Final State";
pub const CORRECTNESS_KEY: &str = "correctness";

/// Compare a run's outputs to an example's expected outputs.
///
/// Returns one result per facet, in a fixed order: trajectory correctness,
/// step-count ratio, then (when both sides carry a state) final-state
/// correctness, then (when the run carries an output and a judge is given)
/// output correctness. All validation happens before any score is computed.
pub async fn compare_outputs(
    run_outputs: &RunOutputs,
    example_outputs: &ExampleOutputs,
    run_inputs: &RunInputs,
    judge: Option<&dyn AnswerJudge>,
) -> Result<Vec<EvaluationResult>, EvalError> {
    let actual_steps: Vec<&str> = if let Some(steps) = &run_outputs.intermediate_steps {
        // Each pair is (action, observation); only the action's tool
        // identifier is scored.
        steps.iter().map(|step| step.action.tool.as_str()).collect()
    } else if let Some(steps) = &run_outputs.actual_steps {
        steps.iter().map(String::as_str).collect()
    } else {
        return Err(EvalError::InvalidRunOutput);
    };

    let expected_steps = example_outputs
        .expected_steps
        .as_deref()
        .ok_or(EvalError::MissingExpectedSteps)?;
    if expected_steps.is_empty() {
        return Err(EvalError::EmptyExpectedSteps);
    }

    // Resolve output-grading inputs up front so the evaluation is
    // all-or-nothing: no partial result escapes when a reference or
    // question is missing.
    let grading = match (&run_outputs.output, judge) {
        (Some(output), Some(judge)) => {
            let reference = example_outputs
                .reference
                .as_deref()
                .ok_or(EvalError::MissingReference)?;
            let question = if judge.requires_question() {
                Some(
                    run_inputs
                        .question
                        .as_deref()
                        .ok_or(EvalError::MissingQuestion(judge.name()))?,
                )
            } else {
                None
            };
            Some((judge, output.as_str(), reference, question))
        }
        _ => None,
    };

    let order_matters = example_outputs.order_matters.unwrap_or(true);
    let matched = if order_matters {
        actual_steps
            .iter()
            .copied()
            .eq(expected_steps.iter().map(String::as_str))
    } else {
        // Sorting both sides compares the multiset of tools used: same
        // tools, same multiplicity, any order.
        let mut actual = actual_steps.clone();
        let mut expected: Vec<&str> = expected_steps.iter().map(String::as_str).collect();
        actual.sort_unstable();
        expected.sort_unstable();
        actual == expected
    };
    let trajectory_score = if matched { 1.0 } else { 0.0 };

    let step_fraction = actual_steps.len() as f64 / expected_steps.len() as f64;

    let mut results = vec![
        EvaluationResult::new(TRAJECTORY_KEY, trajectory_score)
            .with_comment(format!("Order matters={order_matters}")),
        EvaluationResult::new(STEP_RATIO_KEY, step_fraction),
    ];

    // Exact structural equality only. Too simple for stateful tasks with
    // tolerances; will need to be evolved.
    if let (Some(state), Some(expected_state)) = (&run_outputs.state, &example_outputs.state) {
        let state_score = if state == expected_state { 1.0 } else { 0.0 };
        results.push(EvaluationResult::new(FINAL_STATE_KEY, state_score));
    }

    if let Some((judge, prediction, reference, question)) = grading {
        let verdict = judge.judge(prediction, reference, question).await?;
        results.push(
            EvaluationResult::new(CORRECTNESS_KEY, verdict.score)
                .with_source_run_id(verdict.run_id),
        );
    } else if run_outputs.output.is_some() {
        tracing::debug!("run carries an output but no judge is configured; skipping grading");
    }

    Ok(results)
}

/// Entry point invoked once per (run, example) pair. Stateless apart from
/// the shared judge handle, so a single instance can evaluate many pairs
/// concurrently.
pub struct TrajectoryEvaluator {
    judge: Option<Arc<dyn AnswerJudge>>,
}

impl TrajectoryEvaluator {
    /// Build an evaluator for the given judging mode. With no explicit
    /// provider and a mode other than `none`, a deterministic default judge
    /// client is constructed from the environment.
    pub fn new(
        mode: OutputEvaluation,
        provider: Option<Arc<dyn LLMProvider>>,
    ) -> Result<Self, EvalError> {
        let mut config = JudgeConfig::new(mode);
        if let Some(provider) = provider {
            config = config.with_provider(provider);
        }
        Self::from_judge_config(config)
    }

    pub fn from_judge_config(config: JudgeConfig) -> Result<Self, EvalError> {
        Ok(Self { judge: config.build()? })
    }

    /// Evaluator that scores trajectories only.
    pub fn without_judge() -> Self {
        Self { judge: None }
    }

    /// Evaluator with a pre-built judge.
    pub fn with_judge(judge: Arc<dyn AnswerJudge>) -> Self {
        Self { judge: Some(judge) }
    }

    pub async fn evaluate_run(
        &self,
        run: &Run,
        example: &Example,
    ) -> Result<Vec<EvaluationResult>, EvalError> {
        let outputs = run.outputs.as_ref().ok_or(EvalError::InvalidRunOutput)?;
        if !outputs.has_steps() {
            return Err(EvalError::InvalidRunOutput);
        }
        if example.outputs.expected_steps.is_none() {
            return Err(EvalError::MissingExpectedSteps);
        }

        // The question normally travels with the run inputs; fall back to
        // the example's copy when the run record omits it.
        let inputs = match (&run.inputs.question, &example.inputs.question) {
            (None, Some(question)) => RunInputs {
                question: Some(question.clone()),
            },
            _ => run.inputs.clone(),
        };

        compare_outputs(outputs, &example.outputs, &inputs, self.judge.as_deref()).await
    }
}
