//! Parse LLM output into decompositions, claim candidates and verdicts

use corroborate_domain::{ClaimKey, Polarity, ReasoningError};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Parsed answer to a decomposition prompt
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecompositionPlan {
    /// Whether the model judged the question complex
    pub is_complex: bool,
    /// Model's explanation
    #[serde(default)]
    pub reasoning: String,
    /// Proposed sub-questions, in order
    #[serde(default)]
    pub sub_questions: Vec<String>,
}

/// One claim proposed by the extraction prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimCandidate {
    /// Statement as written by the model
    pub statement: String,
    /// Asserted or negated
    pub polarity: Polarity,
}

/// Parse a decomposition response
///
/// Blank and duplicate sub-questions are dropped.
pub fn parse_decomposition(response: &str) -> Result<DecompositionPlan, ReasoningError> {
    let json_str = extract_json(response)?;
    let mut plan: DecompositionPlan = serde_json::from_str(&json_str)
        .map_err(|e| ReasoningError::MalformedOutput(format!("decomposition: {}", e)))?;

    let mut seen = Vec::new();
    plan.sub_questions = plan
        .sub_questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| {
            let key = ClaimKey::from_statement(q);
            if key.is_empty() || seen.contains(&key) {
                return false;
            }
            seen.push(key);
            true
        })
        .collect();
    Ok(plan)
}

/// Parse an extraction response into claim candidates
///
/// Malformed entries are skipped with a warning; a response that is not a
/// JSON array at all is an error.
pub fn parse_claims(response: &str) -> Result<Vec<ClaimCandidate>, ReasoningError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| ReasoningError::MalformedOutput(format!("JSON parse error: {}", e)))?;

    // Some models wrap the array in an object
    let claims_array = match &json {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("claims")
            .and_then(Value::as_array)
            .ok_or_else(|| ReasoningError::MalformedOutput("Expected JSON array".to_string()))?,
        _ => return Err(ReasoningError::MalformedOutput("Expected JSON array".to_string())),
    };

    let mut claims = Vec::new();
    for (idx, claim_json) in claims_array.iter().enumerate() {
        match parse_claim_json(claim_json) {
            Ok(claim) => claims.push(claim),
            Err(e) => warn!("Failed to parse claim {}: {}", idx, e),
        }
    }
    Ok(claims)
}

/// Parse an equivalence verdict
pub fn parse_equivalence(response: &str) -> Result<bool, ReasoningError> {
    let json_str = extract_json(response)?;
    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| ReasoningError::MalformedOutput(format!("JSON parse error: {}", e)))?;

    match &json {
        Value::Bool(b) => Ok(*b),
        Value::Object(obj) => obj
            .get("equivalent")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                ReasoningError::MalformedOutput("Missing or invalid 'equivalent'".to_string())
            }),
        _ => Err(ReasoningError::MalformedOutput(
            "Expected JSON object".to_string(),
        )),
    }
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> Result<String, ReasoningError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(ReasoningError::MalformedOutput("Empty code block".to_string()));
        }

        // Skip the opening fence and, if present, the closing one
        let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        Ok(lines[1..end].join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_claim_json(json: &Value) -> Result<ClaimCandidate, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Claim is not a JSON object".to_string())?;

    let statement = obj
        .get("statement")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .ok_or_else(|| "Missing or invalid 'statement'".to_string())?;

    if ClaimKey::from_statement(statement).is_empty() {
        return Err("Empty 'statement'".to_string());
    }

    let negated = match obj.get("negated") {
        None | Some(Value::Null) => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| "Invalid 'negated'".to_string())?,
    };

    Ok(ClaimCandidate {
        statement: statement.to_string(),
        polarity: Polarity::from_negated(negated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decomposition() {
        let response = r#"{
            "is_complex": true,
            "reasoning": "two aspects",
            "sub_questions": ["What is X?", "  ", "What is X ?", "Why does X matter?"]
        }"#;

        let plan = parse_decomposition(response).unwrap();
        assert!(plan.is_complex);
        assert_eq!(plan.sub_questions, vec!["What is X?", "Why does X matter?"]);
    }

    #[test]
    fn test_parse_simple_decomposition() {
        let plan = parse_decomposition(r#"{"is_complex": false}"#).unwrap();
        assert!(!plan.is_complex);
        assert!(plan.sub_questions.is_empty());
    }

    #[test]
    fn test_parse_decomposition_missing_flag() {
        let result = parse_decomposition(r#"{"sub_questions": ["a"]}"#);
        assert!(matches!(result, Err(ReasoningError::MalformedOutput(_))));
    }

    #[test]
    fn test_parse_valid_claims() {
        let response = r#"[
            { "statement": "X is true.", "negated": false },
            { "statement": "Y causes X.", "negated": true }
        ]"#;

        let claims = parse_claims(response).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].statement, "X is true.");
        assert_eq!(claims[0].polarity, Polarity::Asserted);
        assert_eq!(claims[1].polarity, Polarity::Negated);
    }

    #[test]
    fn test_parse_claims_with_markdown_wrapper() {
        let response = r#"```json
[
    { "statement": "Bob lives in Seattle" }
]
```"#;

        let claims = parse_claims(response).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].polarity, Polarity::Asserted);
    }

    #[test]
    fn test_parse_claims_wrapped_in_object() {
        let claims = parse_claims(r#"{"claims": [{"statement": "X is true"}]}"#).unwrap();
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn test_parse_partial_success() {
        let response = r#"[
            { "statement": "Alice works at Acme" },
            { "negated": true },
            { "statement": "!!" },
            { "statement": "Charlie lives in Portland", "negated": "yes" },
            { "statement": "Dana lives in Boston", "negated": null }
        ]"#;

        let claims = parse_claims(response).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].statement, "Alice works at Acme");
        assert_eq!(claims[1].statement, "Dana lives in Boston");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_claims("This is not JSON").is_err());
        assert!(parse_claims(r#""just a string""#).is_err());
    }

    #[test]
    fn test_parse_equivalence() {
        assert!(parse_equivalence(r#"{"equivalent": true}"#).unwrap());
        assert!(!parse_equivalence("```\n{\"equivalent\": false}\n```").unwrap());
        assert!(parse_equivalence("true").unwrap());
        assert!(parse_equivalence(r#"{"same": true}"#).is_err());
    }

    #[test]
    fn test_extract_json_from_plain_json() {
        let json = r#"{"key": "value"}"#;
        assert_eq!(extract_json(json).unwrap(), json);
    }

    #[test]
    fn test_extract_json_from_markdown() {
        let response = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(response).unwrap().trim(), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_unclosed_fence() {
        let response = "```\n[1, 2]";
        assert_eq!(extract_json(response).unwrap(), "[1, 2]");
        assert!(extract_json("```").is_err());
    }
}
