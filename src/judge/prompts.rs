use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::json;

use crate::error::EvalError;

/// Generic reference-graded QA template, question included.
const QA_TEMPLATE: &str = "\
You are a teacher grading a quiz.
You are given a question, the student's answer, and the true answer, and are asked to score the student answer as either CORRECT or INCORRECT.

Example Format:
QUESTION: question here
STUDENT ANSWER: student's answer here
TRUE ANSWER: true answer here
GRADE: CORRECT or INCORRECT here

Grade the student answers based ONLY on their factual accuracy. Ignore differences in punctuation and phrasing between the student answer and true answer. It is OK if the student answer contains more information than the true answer, as long as it does not contain any conflicting statements. Begin!

QUESTION: {{query}}
STUDENT ANSWER: {{result}}
TRUE ANSWER: {{answer}}
GRADE:";

/// Same grading format, tuned for tasks whose math deliberately deviates
/// from the usual rules: the true answer is authoritative even when it looks
/// wrong, so only the final value is compared.
const QA_MATH_TEMPLATE: &str = "\
You are a teacher grading a quiz.
You are given a question, the student's answer, and the true answer, and are asked to score the student answer as either CORRECT or INCORRECT.
The math in the question follows an altered set of rules, so do not re-derive the answer yourself: the true answer is the ground truth even when it disagrees with standard arithmetic.

Example Format:
QUESTION: question here
STUDENT ANSWER: student's answer here
TRUE ANSWER: true answer here
GRADE: CORRECT or INCORRECT here

Grade the student answer based ONLY on whether its final value matches the true answer. Ignore differences in formatting, units, and phrasing. Begin!

QUESTION: {{query}}
STUDENT ANSWER: {{result}}
TRUE ANSWER: {{answer}}
GRADE:";

/// Question-free variant: the model sees only the expert answer and the
/// submission and must reply with a single-word verdict.
const QA_MATH_WITHOUT_QUESTION_TEMPLATE: &str = "\
You are comparing a submitted answer to an expert answer on a math question.
The math in the question follows an altered set of rules, so the expert answer is the ground truth even when it looks surprising.
Reply with CORRECT if the submitted answer matches the expert answer, and with INCORRECT otherwise. Respond with a single word and nothing else.

EXPERT ANSWER: {{answer}}
SUBMITTED ANSWER: {{result}}";

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hb = Handlebars::new();
    // Answers are plain text, not HTML.
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_template_string("qa", QA_TEMPLATE)
        .expect("built-in qa template is valid");
    hb.register_template_string("qa_math", QA_MATH_TEMPLATE)
        .expect("built-in qa_math template is valid");
    hb.register_template_string("qa_math_without_question", QA_MATH_WITHOUT_QUESTION_TEMPLATE)
        .expect("built-in qa_math_without_question template is valid");
    hb
});

pub(crate) fn render_grading(
    template: &str,
    question: &str,
    reference: &str,
    prediction: &str,
) -> Result<String, EvalError> {
    let prompt = TEMPLATES.render(
        template,
        &json!({ "query": question, "answer": reference, "result": prediction }),
    )?;
    Ok(prompt)
}

pub(crate) fn render_qa_math_without_question(
    reference: &str,
    prediction: &str,
) -> Result<String, EvalError> {
    let prompt = TEMPLATES.render(
        "qa_math_without_question",
        &json!({ "answer": reference, "result": prediction }),
    )?;
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_question_free_prompt() {
        let prompt = render_qa_math_without_question("42", "the answer is 42").unwrap();
        assert!(prompt.contains("EXPERT ANSWER: 42"));
        assert!(prompt.contains("SUBMITTED ANSWER: the answer is 42"));
    }

    #[test]
    fn renders_grading_prompt_with_question() {
        let prompt = render_grading("qa_math", "What is 2 + 2?", "5", "4").unwrap();
        assert!(prompt.contains("QUESTION: What is 2 + 2?"));
        assert!(prompt.contains("TRUE ANSWER: 5"));
        assert!(prompt.contains("STUDENT ANSWER: 4"));
        assert!(prompt.trim_end().ends_with("GRADE:"));
    }

    #[test]
    fn does_not_escape_answer_text() {
        let prompt = render_qa_math_without_question("a < b & c", "a<b").unwrap();
        assert!(prompt.contains("a < b & c"));
    }
}
