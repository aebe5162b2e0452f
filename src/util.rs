//! Small utility helpers used across modules.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Named values available to prompt and fallback templates.
pub type Variables = Map<String, Value>;

fn placeholder_regex() -> &'static Regex {
  static REGEX: OnceLock<Regex> = OnceLock::new();
  REGEX.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid"))
}

/// Replaces every `{identifier}` token in `template` with the matching variable.
///
/// Tokens without a matching key are left untouched, braces included.
/// This never fails: a missing variable is simply not substituted.
pub fn interpolate(template: &str, vars: &Variables) -> String {
  placeholder_regex()
    .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
      Some(v) => value_to_string(v),
      None => caps[0].to_string(),
    })
    .into_owned()
}

/// Applies `interpolate` to every string inside a JSON payload.
/// Object keys and array order are preserved; non-string leaves pass through.
pub fn interpolate_value(value: &Value, vars: &Variables) -> Value {
  match value {
    Value::String(s) => Value::String(interpolate(s, vars)),
    Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(v, vars)).collect()),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), interpolate_value(v, vars)))
        .collect(),
    ),
    other => other.clone(),
  }
}

fn value_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Null => "null".to_string(),
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn vars(v: Value) -> Variables {
    v.as_object().cloned().unwrap_or_default()
  }

  #[test]
  fn missing_variable_is_left_verbatim() {
    assert_eq!(interpolate("Hello {name}", &Variables::new()), "Hello {name}");
  }

  #[test]
  fn known_variable_is_substituted() {
    let v = vars(json!({ "name": "Ada" }));
    assert_eq!(interpolate("Hello {name}", &v), "Hello Ada");
  }

  #[test]
  fn repeated_and_mixed_tokens() {
    let v = vars(json!({ "a": "x", "n": 3, "flag": true }));
    assert_eq!(interpolate("{a}-{a} {n} {flag} {b}", &v), "x-x 3 true {b}");
  }

  #[test]
  fn non_word_tokens_are_not_placeholders() {
    let v = vars(json!({ "a b": "nope", "a": "yes" }));
    assert_eq!(interpolate("{a b} {a} {} {{a}}", &v), "{a b} yes {} {yes}");
  }

  #[test]
  fn structured_payloads_keep_shape() {
    let v = vars(json!({ "goal": "build a counter" }));
    let tpl = json!({
      "title": "Implement {goal}",
      "count": 3,
      "steps": [{ "hints": ["Think about {goal}", "{missing}"] }, null]
    });
    let out = interpolate_value(&tpl, &v);
    assert_eq!(out["title"], "Implement build a counter");
    assert_eq!(out["count"], 3);
    assert_eq!(out["steps"][0]["hints"][0], "Think about build a counter");
    assert_eq!(out["steps"][0]["hints"][1], "{missing}");
    assert!(out["steps"][1].is_null());
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let long = "é".repeat(20);
    assert!(trunc_for_log(&long, 5).starts_with("ééééé…"));
  }
}
