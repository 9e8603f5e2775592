//! Model registry: canonical Gemini model ids, alias resolution, fallback
//! chains, and model-family tagging.

use gembridge_translate::parse_model_suffix;

/// Default model used when the request omits or misnames the model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Canonical Gemini model ids accepted by the Code Assist upstream.
pub const CANONICAL_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite-preview",
    "gemini-3-pro-preview",
    "gemini-3-flash-preview",
];

/// Static alias table mapping convenience names to canonical ids.
const ALIASES: &[(&str, &str)] = &[
    ("gemini-3-pro-high", "gemini-3-pro-preview"),
    ("gemini-3", "gemini-3-flash-preview"),
    ("gemini-2.5-flash-lite", "gemini-2.5-flash-lite-preview"),
];

/// Static fallback table consulted when auto-switching is enabled: each
/// entry redirects a rate-limited model to a cheaper sibling.
const FALLBACKS: &[(&str, &str)] = &[
    ("gemini-3-pro-preview", "gemini-2.5-pro"),
    ("gemini-2.5-pro", "gemini-2.5-flash"),
    ("gemini-2.5-flash", "gemini-2.5-flash-lite-preview"),
];

/// Which thinking-signature cache a model keys into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Gemini,
    Claude,
}

impl ModelFamily {
    /// Membership is derived from the substring `"claude"` in the model
    /// name the client originally requested.
    #[must_use]
    pub fn of(requested_model: &str) -> Self {
        if requested_model.contains("claude") {
            Self::Claude
        } else {
            Self::Gemini
        }
    }
}

/// Map a user-supplied model name to a canonical Gemini model id.
///
/// Strips a trailing `[<digits>m]` budget suffix, applies the alias table,
/// passes known canonical ids and anything `gemini-`-prefixed through, and
/// falls back to [`DEFAULT_MODEL`] for everything else (e.g. Claude ids
/// sent by Anthropic-native tools).
#[must_use]
pub fn resolve(name: Option<&str>) -> String {
    let Some(name) = name else {
        return DEFAULT_MODEL.to_string();
    };
    let stripped = parse_model_suffix(name).model;

    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == stripped) {
        return (*canonical).to_string();
    }
    if CANONICAL_MODELS.contains(&stripped.as_str()) || stripped.starts_with("gemini-") {
        return stripped;
    }
    DEFAULT_MODEL.to_string()
}

/// The fallback model for `model`, if the static table has one.
#[must_use]
pub fn fallback_for(model: &str) -> Option<&'static str> {
    FALLBACKS
        .iter()
        .find(|(from, _)| *from == model)
        .map(|(_, to)| *to)
}
