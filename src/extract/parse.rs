//! Lenient parsing of model answers.

use serde::Deserialize;

/// Confidence used when the model gives none.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// A record as parsed, before provenance is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub name: String,
    pub detail: Option<String>,
    pub confidence: f32,
}

#[derive(Deserialize)]
struct Answer {
    #[serde(default, alias = "items", alias = "results")]
    records: Vec<AnswerRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerRecord {
    Bare(String),
    Full {
        #[serde(alias = "title")]
        name: String,
        #[serde(default, alias = "description")]
        detail: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

/// Parse a `{"records": [...]}` answer.
///
/// Reasoning blocks, code fences and prose around the object are ignored:
/// the text from the first `{` to the last `}` is what gets parsed.
pub fn parse_records(raw: &str) -> Result<Vec<ParsedRecord>, String> {
    let body = match raw.rfind("</think>") {
        Some(i) => &raw[i + "</think>".len()..],
        None => raw,
    };

    let start = body.find('{').ok_or("response contains no JSON object")?;
    let end = body.rfind('}').ok_or("response contains no JSON object")?;
    if end < start {
        return Err("response contains no JSON object".to_string());
    }

    let answer: Answer = serde_json::from_str(&body[start..=end])
        .map_err(|e| format!("malformed JSON response: {}", e))?;

    Ok(answer
        .records
        .into_iter()
        .map(|record| match record {
            AnswerRecord::Bare(name) => ParsedRecord {
                name: name.trim().to_string(),
                detail: None,
                confidence: DEFAULT_CONFIDENCE,
            },
            AnswerRecord::Full {
                name,
                detail,
                confidence,
            } => ParsedRecord {
                name: name.trim().to_string(),
                detail: detail.filter(|d| !d.trim().is_empty()),
                confidence: confidence
                    .filter(|c| c.is_finite())
                    .map(|c| c.clamp(0.0, 1.0) as f32)
                    .unwrap_or(DEFAULT_CONFIDENCE),
            },
        })
        .collect())
}
