use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spurwerk::{
    ChatMessage, CompletionRequest, CompletionResponse, Example, ExampleOutputs, LLMError,
    LLMProvider, OutputEvaluation, Run, RunInputs, RunOutputs, TrajectoryEvaluator,
    CORRECTNESS_KEY, FINAL_STATE_KEY, STEP_RATIO_KEY, TRAJECTORY_KEY,
};

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
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
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

fn run_with_steps(steps: &[&str]) -> Run {
    Run {
        inputs: RunInputs::default(),
        outputs: Some(RunOutputs {
            actual_steps: Some(steps.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }),
    }
}

fn example_with_steps(steps: &[&str], order_matters: Option<bool>) -> Example {
    Example {
        inputs: Default::default(),
        outputs: ExampleOutputs {
            expected_steps: Some(steps.iter().map(|s| s.to_string()).collect()),
            order_matters,
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn ordered_match_yields_trajectory_and_ratio_only() {
    let evaluator = TrajectoryEvaluator::without_judge();
    let run = run_with_steps(&["search", "calculate"]);
    let example = example_with_steps(&["search", "calculate"], Some(true));

    let results = evaluator.evaluate_run(&run, &example).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].key, TRAJECTORY_KEY);
    assert_eq!(results[0].score, 1.0);
    assert_eq!(results[1].key, STEP_RATIO_KEY);
    assert_eq!(results[1].score, 1.0);
    assert!(!results.iter().any(|r| r.key == FINAL_STATE_KEY));
    assert!(!results.iter().any(|r| r.key == CORRECTNESS_KEY));
}

#[tokio::test]
async fn unordered_match_accepts_permutations() {
    let evaluator = TrajectoryEvaluator::without_judge();
    let run = run_with_steps(&["b", "a"]);
    let example = example_with_steps(&["a", "b"], Some(false));

    let results = evaluator.evaluate_run(&run, &example).await.unwrap();

    assert_eq!(results[0].key, TRAJECTORY_KEY);
    assert_eq!(results[0].score, 1.0);
    assert_eq!(results[1].score, 1.0);
}

#[tokio::test]
async fn judged_run_gets_a_correctness_score() {
    let evaluator = TrajectoryEvaluator::new(
        OutputEvaluation::QaMathWithoutQuestion,
        Some(ScriptedProvider::new(vec!["CORRECT because equal"])),
    )
    .unwrap();

    let mut run = run_with_steps(&["add"]);
    run.outputs.as_mut().unwrap().output = Some("42".to_string());
    let mut example = example_with_steps(&["add"], None);
    example.outputs.reference = Some("42".to_string());

    let results = evaluator.evaluate_run(&run, &example).await.unwrap();
    let correctness = results.iter().find(|r| r.key == CORRECTNESS_KEY).unwrap();
    assert_eq!(correctness.score, 1.0);
    assert!(correctness.source_run_id.is_some());
}

#[tokio::test]
async fn judge_rejection_scores_zero_without_error() {
    let evaluator = TrajectoryEvaluator::new(
        OutputEvaluation::QaMathWithoutQuestion,
        Some(ScriptedProvider::new(vec!["INCORRECT"])),
    )
    .unwrap();

    let mut run = run_with_steps(&["add"]);
    run.outputs.as_mut().unwrap().output = Some("41".to_string());
    let mut example = example_with_steps(&["add"], None);
    example.outputs.reference = Some("42".to_string());

    let results = evaluator.evaluate_run(&run, &example).await.unwrap();
    let correctness = results.iter().find(|r| r.key == CORRECTNESS_KEY).unwrap();
    assert_eq!(correctness.score, 0.0);
}

#[tokio::test]
async fn shared_evaluator_handles_concurrent_pairs() {
    let evaluator = Arc::new(TrajectoryEvaluator::without_judge());

    let mut handles = Vec::new();
    for steps in [vec!["a", "b"], vec!["b", "a"], vec!["a"]] {
        let evaluator = Arc::clone(&evaluator);
        handles.push(tokio::spawn(async move {
            let run = run_with_steps(&steps);
            let example = example_with_steps(&["a", "b"], Some(true));
            evaluator.evaluate_run(&run, &example).await
        }));
    }

    let mut trajectory_scores = Vec::new();
    for handle in handles {
        let results = handle.await.unwrap().unwrap();
        trajectory_scores.push(results[0].score);
    }

    assert_eq!(trajectory_scores, vec![1.0, 0.0, 0.0]);
}
