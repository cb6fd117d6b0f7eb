use serde::de::DeserializeOwned;

use crate::llm::LLModel;

/// How [`request_llm_structured`](super::LLMWriteSession::request_llm_structured)
/// recovers from output that does not parse.
#[derive(Debug, Clone)]
pub struct StructuredRequestConfig {
    /// Number of repair rounds after the first parse fails.
    pub retries: usize,
    /// Model asked to repair malformed output. Defaults to the session model.
    pub fixing_model: Option<LLModel>,
    /// Extra guidance appended to the request, e.g. an example of the shape.
    pub instructions: Option<String>,
}

impl Default for StructuredRequestConfig {
    fn default() -> Self {
        Self {
            retries: 1,
            fixing_model: None,
            instructions: None,
        }
    }
}

impl StructuredRequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_fixing_model(mut self, model: LLModel) -> Self {
        self.fixing_model = Some(model);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// A decoded structured reply together with the text it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResponse<T> {
    pub structure: T,
    pub raw: String,
}

pub(crate) const FIXING_SYSTEM_PROMPT: &str = "You repair malformed JSON. \
Reply with the corrected JSON document only, without commentary or code fences.";

/// Strips a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub(crate) fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Forecast {
        city: String,
        celsius: i32,
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain: Forecast = parse_structured(r#"{"city": "Oslo", "celsius": 4}"#).unwrap();
        assert_eq!(plain.city, "Oslo");

        let fenced: Forecast =
            parse_structured("```json\n{\"city\": \"Rome\", \"celsius\": 21}\n```").unwrap();
        assert_eq!(
            fenced,
            Forecast {
                city: "Rome".into(),
                celsius: 21
            }
        );
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_structured::<Forecast>("It is sunny in Rome.").is_err());
    }
}
