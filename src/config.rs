//! Loading agent configuration (prompts + generation parameters) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `GenerationSettings` for the expected schema.
//! Every field has a built-in default, so an empty file (or no file) is valid.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
}

/// System/user templates per generation kind. Placeholders use `{name}` syntax.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub quest_system: String,
  pub quest_user_template: String,
  pub feedback_system: String,
  pub feedback_user_template: String,
  pub hint_system: String,
  pub hint_user_template: String,
  pub arrangement_system: String,
  pub arrangement_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quest_system: "You are a senior engineer who designs hands-on coding quests. Respond ONLY with strict JSON.".into(),
      quest_user_template: "Article: {articleUrl}\nGoal: {implementationGoal}\nDifficulty: {difficulty}\nProject: {projectName} ({projectDescription})\n\nDesign a quest that applies the article to the project. Return JSON {\"title\": string, \"description\": string, \"steps\": [{\"title\": string, \"description\": string, \"type\": \"ARRANGE_CODE\"|\"IMPLEMENT_CODE\"|\"VERIFY_OUTPUT\", \"expectedCode\"?: string, \"hints\": [string]}]}. Use 3 to 6 steps; include expectedCode only for IMPLEMENT_CODE steps.".into(),
      feedback_system: "You are a strict but encouraging code reviewer. Compare the submission to the reference. Respond ONLY with strict JSON.".into(),
      feedback_user_template: "File: {filePath}\n\nSubmitted code:\n{submittedCode}\n\nReference code:\n{expectedCode}\n\nReturn JSON {\"score\": integer 0-100, \"feedback\": string, \"improvements\": [string], \"hints\": [string], \"errors\": [{\"type\": \"syntax\"|\"logic\"|\"style\"|\"missing\", \"line\"?: integer, \"message\": string, \"suggestion\"?: string}]}.".into(),
      hint_system: "You are a patient coding mentor. Give hints that guide without revealing the full solution. Respond ONLY with strict JSON.".into(),
      hint_user_template: "Step goal: {stepGoal}\nDifficulty: {difficulty}\nError message: {errorMessage}\n\nCurrent code:\n{currentCode}\n\nReturn JSON {\"hints\": [string]} with 3 progressively more specific hints.".into(),
      arrangement_system: "You turn working code into block-ordering puzzles for learners. Respond ONLY with strict JSON.".into(),
      arrangement_user_template: "Learning goal: {learningGoal}\n\nCode:\n{originalCode}\n\nSplit the code into logical blocks. Return JSON {\"title\": string, \"description\": string, \"shuffledBlocks\": [{\"id\": string, \"code\": string, \"correctOrder\": integer}], \"hints\": [string]}. correctOrder starts at 1 and is unique per block; list blocks shuffled.".into(),
    }
  }
}

/// Sampling parameters for one generation kind.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct KindParams {
  pub temperature: f32,
  pub max_output_tokens: u32,
}

/// Model selection, timeout, and per-kind sampling.
/// Feedback and arrangement are comparison-bound, so they run cooler.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub model: String,
  pub base_url: String,
  pub timeout_secs: u64,
  pub quest: KindParams,
  pub feedback: KindParams,
  pub hint: KindParams,
  pub arrangement: KindParams,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      model: "gpt-4o-mini".into(),
      base_url: "https://api.openai.com/v1".into(),
      timeout_secs: 10,
      quest: KindParams { temperature: 0.7, max_output_tokens: 2000 },
      feedback: KindParams { temperature: 0.3, max_output_tokens: 1500 },
      hint: KindParams { temperature: 0.7, max_output_tokens: 500 },
      arrangement: KindParams { temperature: 0.3, max_output_tokens: 1500 },
    }
  }
}

impl GenerationSettings {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// Env overrides: OPENAI_MODEL, OPENAI_BASE_URL, MODEL_TIMEOUT_SECS.
  pub fn apply_env(&mut self) {
    if let Ok(m) = std::env::var("OPENAI_MODEL") {
      self.model = m;
    }
    if let Ok(u) = std::env::var("OPENAI_BASE_URL") {
      self.base_url = u;
    }
    if let Some(t) = std::env::var("MODEL_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
      self.timeout_secs = t;
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "codeclimb", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codeclimb", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "codeclimb", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}
