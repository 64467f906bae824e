use serde::{Deserialize, Serialize};

/// A bridging concept proposed by the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeCandidate {
    pub title: String,
    /// Always an `https://` url
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BridgeParseError {
    #[error("empty response")]
    Empty,

    #[error("response is not JSON: {0}")]
    NotJson(String),

    #[error("expected a JSON array, got {0}")]
    NotArray(&'static str),
}

/// Loosely shaped element as the model tends to produce it.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(default)]
    title: Option<serde_json::Value>,
    #[serde(default)]
    link: Option<serde_json::Value>,
    #[serde(default)]
    summary: Option<serde_json::Value>,
}

/// Remove code fences and literal `\n` escapes the model wraps around its JSON.
pub fn strip_response(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .replace("\\n", "")
        .trim()
        .to_string()
}

/// Parse a model response into validated candidates.
///
/// Elements without a usable title or link are dropped. Anything that is not
/// a JSON array is an error.
pub fn parse_candidates(raw: &str) -> Result<Vec<BridgeCandidate>, BridgeParseError> {
    let cleaned = strip_response(raw);
    if cleaned.is_empty() {
        return Err(BridgeParseError::Empty);
    }

    let value: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(|e| BridgeParseError::NotJson(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => return Err(BridgeParseError::NotArray("object")),
        serde_json::Value::String(_) => return Err(BridgeParseError::NotArray("string")),
        serde_json::Value::Number(_) => return Err(BridgeParseError::NotArray("number")),
        serde_json::Value::Bool(_) => return Err(BridgeParseError::NotArray("bool")),
        serde_json::Value::Null => return Err(BridgeParseError::NotArray("null")),
    };

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        let Ok(raw) = serde_json::from_value::<RawCandidate>(item) else {
            log::debug!("skipping non-object bridge element");
            continue;
        };

        let title = raw.title.as_ref().and_then(as_text);
        let link = raw.link.as_ref().and_then(as_text);
        let (Some(title), Some(link)) = (title, link) else {
            log::debug!("skipping bridge element without title or link");
            continue;
        };
        let Some(link) = normalize_link(&link) else {
            log::debug!("skipping bridge '{title}': malformed link '{link}'");
            continue;
        };

        candidates.push(BridgeCandidate {
            title,
            link,
            summary: raw.summary.as_ref().and_then(as_text),
        });
    }

    Ok(candidates)
}

fn as_text(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Force an `https://` scheme on a raw link.
///
/// The result starts right after the second `//` when there is one (models
/// like to double the scheme), else after the first, else at the start.
/// Returns `None` when what remains is not a url with a host.
pub fn normalize_link(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let mut marks = raw.match_indices("//").map(|(i, _)| i);
    let rest = match (marks.next(), marks.next()) {
        (_, Some(second)) => &raw[second + 2..],
        (Some(first), None) => &raw[first + 2..],
        (None, None) => raw,
    };

    let rest = rest.trim_start_matches('/');
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return None;
    }

    let candidate = format!("https://{rest}");
    let parsed = url::Url::parse(&candidate).ok()?;
    match parsed.host_str() {
        Some(host) if host.contains('.') || host == "localhost" => Some(candidate),
        _ => None,
    }
}

/// Strict-format instruction for one pair of topics.
pub fn bridge_prompt(topic_a: &str, topic_b: &str, context: &str) -> String {
    format!(
        "You connect ideas between notes.\n\
         Topic A: {topic_a}\n\
         Topic B: {topic_b}\n\
         Context:\n{context}\n\n\
         Suggest concepts that bridge Topic A and Topic B, using only the context above.\n\
         Answer with a JSON array and nothing else. Each element must be an object \
         {{\"title\": string, \"link\": string}} where \"title\" is a summary of the \
         concept in at most 3 words and \"link\" is a Wikipedia url for it.\n\
         If there is no meaningful bridge, answer with []."
    )
}
