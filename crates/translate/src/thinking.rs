//! Thinking-budget handling: model-name suffix parsing and reasoning-effort
//! mapping onto Gemini's `generationConfig.thinkingConfig`.

use serde_json::{Value, json};

/// Result of parsing a model name with an optional `[<digits>m]` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSuffix {
    /// The clean model name without the suffix.
    pub model: String,
    /// The parsed thinking budget in tokens, if a suffix was present.
    pub thinking_budget: Option<u32>,
}

/// Parses a trailing `[<digits>m]` budget hint, e.g. `gemini-2.5-pro[8m]`.
///
/// The numeric part is interpreted as thousands-of-tokens (`8m` → 8192).
/// Names without a well-formed suffix are returned unchanged.
#[must_use]
pub fn parse_model_suffix(model: &str) -> ModelSuffix {
    if let Some(open) = model.rfind('[')
        && model.ends_with(']')
    {
        let inner = &model[open + 1..model.len() - 1];
        if let Some(digits) = inner.strip_suffix('m')
            && let Ok(thousands) = digits.parse::<u32>()
        {
            return ModelSuffix {
                model: model[..open].to_string(),
                thinking_budget: Some(thousands.saturating_mul(1024)),
            };
        }
    }
    ModelSuffix {
        model: model.to_string(),
        thinking_budget: None,
    }
}

/// Maps an OpenAI reasoning effort level to a Gemini thinking budget.
#[must_use]
pub fn effort_budget(effort: &str) -> Option<u32> {
    match effort {
        "low" => Some(1024),
        "medium" => Some(8192),
        "high" => Some(24_576),
        _ => None,
    }
}

/// Sets `generationConfig.thinkingConfig` on a translated Gemini request.
///
/// Used by handlers to apply a `[<digits>m]` suffix budget after
/// translation; an existing thinking config (from `reasoning_effort` or an
/// Anthropic `thinking` block) is left untouched.
pub fn apply_thinking_budget(gemini_req: &mut Value, budget: u32) {
    if gemini_req
        .pointer("/generationConfig/thinkingConfig")
        .is_some()
    {
        return;
    }
    gemini_req["generationConfig"]["thinkingConfig"] = json!({
        "thinkingBudget": budget,
        "includeThoughts": true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_parsed() {
        let s = parse_model_suffix("gemini-2.5-pro[8m]");
        assert_eq!(s.model, "gemini-2.5-pro");
        assert_eq!(s.thinking_budget, Some(8192));
    }

    #[test]
    fn test_suffix_single_digit() {
        let s = parse_model_suffix("gemini-3-pro-preview[1m]");
        assert_eq!(s.model, "gemini-3-pro-preview");
        assert_eq!(s.thinking_budget, Some(1024));
    }

    #[test]
    fn test_no_suffix() {
        let s = parse_model_suffix("gemini-2.5-flash");
        assert_eq!(s.model, "gemini-2.5-flash");
        assert!(s.thinking_budget.is_none());
    }

    #[test]
    fn test_malformed_suffix_kept() {
        assert_eq!(parse_model_suffix("model[xm]").model, "model[xm]");
        assert_eq!(parse_model_suffix("model[8]").model, "model[8]");
        assert_eq!(parse_model_suffix("model[m]").model, "model[m]");
    }

    #[test]
    fn test_effort_budgets() {
        assert_eq!(effort_budget("low"), Some(1024));
        assert_eq!(effort_budget("medium"), Some(8192));
        assert_eq!(effort_budget("high"), Some(24_576));
        assert_eq!(effort_budget("extreme"), None);
    }

    #[test]
    fn test_apply_budget() {
        let mut req = serde_json::json!({"generationConfig": {}});
        apply_thinking_budget(&mut req, 4096);
        assert_eq!(
            req["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            4096
        );
        assert_eq!(
            req["generationConfig"]["thinkingConfig"]["includeThoughts"],
            true
        );
    }

    #[test]
    fn test_apply_budget_does_not_override() {
        let mut req = serde_json::json!({
            "generationConfig": {"thinkingConfig": {"thinkingBudget": 1024, "includeThoughts": true}}
        });
        apply_thinking_budget(&mut req, 9999);
        assert_eq!(
            req["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            1024
        );
    }
}
