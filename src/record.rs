use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One completed agent execution against one dataset example.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub inputs: RunInputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<RunOutputs>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

/// What the agent produced. At least one of the two step representations
/// must be present for trajectory scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_steps: Option<Vec<IntermediateStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl RunOutputs {
    pub fn has_steps(&self) -> bool {
        self.intermediate_steps.is_some() || self.actual_steps.is_some()
    }
}

/// One recorded (action, observation) pair from the agent loop. Only the
/// action's tool identifier participates in scoring; the observation is
/// carried as an opaque value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateStep {
    pub action: ToolAction,
    #[serde(default)]
    pub observation: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAction {
    pub tool: String,
    #[serde(default)]
    pub tool_input: Value,
}

/// One dataset entry: the input the agent was asked and the expected outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Example {
    #[serde(default)]
    pub inputs: ExampleInputs,
    #[serde(default)]
    pub outputs: ExampleOutputs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_steps: Option<Vec<String>>,
    /// Whether the expected trajectory must be matched in order. Absent
    /// means true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_matters: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// A single named score. A full evaluation returns an ordered list of these,
/// one per facet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub key: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_run_id: Option<Uuid>,
}

impl EvaluationResult {
    pub fn new(key: impl Into<String>, score: f64) -> Self {
        Self {
            key: key.into(),
            score,
            comment: None,
            source_run_id: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_source_run_id(mut self, run_id: Uuid) -> Self {
        self.source_run_id = Some(run_id);
        self
    }
}
