//! Deterministic fallback content, served whenever the model is unavailable
//! or its answer does not validate. These guarantee the learner always gets a
//! usable artifact.

use serde_json::{json, Value};

use crate::domain::{ArrangementPuzzle, CodeBlock, CodeFeedback, GeneratedQuest, QuestStep, StepType};
use crate::util::{interpolate, interpolate_value, Variables};

/// Quest template interpolated with the request variables.
/// Step types are fixed: arrange, implement, verify.
pub fn fallback_quest_template() -> Value {
  json!({
    "title": "Implement {implementationGoal}",
    "description": "Build {implementationGoal} in {projectName} by applying the ideas from {articleUrl}.",
    "steps": [
      {
        "title": "Arrange the building blocks",
        "description": "Put the core pieces of {implementationGoal} in a working order before writing anything new.",
        "type": "ARRANGE_CODE",
        "hints": [
          "Start with imports and type definitions.",
          "State comes before the functions that change it.",
          "Entry points usually go last."
        ]
      },
      {
        "title": "Implement {implementationGoal}",
        "description": "Write the code for {implementationGoal} inside {projectName}.",
        "type": "IMPLEMENT_CODE",
        "expectedCode": "// Implement {implementationGoal} here",
        "hints": [
          "Re-read the relevant section of the article.",
          "Get the smallest version working first.",
          "Keep functions short and named after what they do."
        ]
      },
      {
        "title": "Verify the output",
        "description": "Run {projectName} and check that {implementationGoal} behaves as expected.",
        "type": "VERIFY_OUTPUT",
        "hints": [
          "Try the happy path first.",
          "Then try an empty or invalid input.",
          "Compare what you see with what the article describes."
        ]
      }
    ]
  })
}

/// Build the fallback quest for the given variables.
/// A template that fails to deserialize is a bug; it degrades to a
/// single implementation step instead of panicking.
pub fn fallback_quest(vars: &Variables) -> GeneratedQuest {
  let value = interpolate_value(&fallback_quest_template(), vars);
  serde_json::from_value(value).unwrap_or_else(|_| GeneratedQuest {
    title: interpolate("Implement {implementationGoal}", vars),
    description: String::new(),
    steps: vec![QuestStep {
      title: interpolate("Implement {implementationGoal}", vars),
      description: String::new(),
      step_type: StepType::ImplementCode,
      expected_code: None,
      hints: vec![],
    }],
  })
}

pub fn fallback_feedback() -> CodeFeedback {
  CodeFeedback {
    score: 50,
    feedback: "We could not analyze your code in detail right now. Compare it with the expected solution and check the points below.".into(),
    improvements: vec![
      "Check that every required function is present.".into(),
      "Look for typos in variable and function names.".into(),
      "Make sure the code handles edge cases.".into(),
    ],
    hints: vec![
      "Compare your code with the expected structure line by line.".into(),
      "Run the code and read any error messages carefully.".into(),
      "Break the problem into smaller pieces.".into(),
    ],
    errors: vec![],
  }
}

pub fn fallback_hints() -> Vec<String> {
  vec![
    "Re-read the step goal and list what the code must do.".into(),
    "Check the error message for the line number and the failing expression.".into(),
    "Try solving a smaller version of the problem first.".into(),
  ]
}

/// One block per non-blank line, kept in original order.
pub fn fallback_arrangement(original_code: &str, learning_goal: &str) -> ArrangementPuzzle {
  let shuffled_blocks = original_code
    .lines()
    .filter(|l| !l.trim().is_empty())
    .enumerate()
    .map(|(i, line)| CodeBlock {
      id: format!("block-{}", i + 1),
      code: line.to_string(),
      correct_order: (i + 1) as u32,
    })
    .collect();

  ArrangementPuzzle {
    title: format!("Arrange the code: {}", learning_goal),
    description: "Put the code blocks in the order that makes the program work.".into(),
    shuffled_blocks,
    hints: vec![
      "Declarations come before their first use.".into(),
      "Look for opening and closing braces that belong together.".into(),
      "Return statements usually close a block.".into(),
    ],
  }
}
