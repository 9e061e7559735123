//! Reconciles loosely-shaped agent replies into a [`NormalizedReply`].
//!
//! The agent is not held to a stable output contract: `result` may be an
//! object, a JSON-encoded string, or plain prose, and some deployments only
//! populate a top-level `message` or a raw `raw` payload string. Each shape is
//! tried in a fixed order; every step returns an explicit optional result and
//! the first match wins. Normalization never fails: when nothing yields text,
//! a fixed fallback sentence is returned.

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{Comparison, ComparisonRow, NormalizedReply, Product};

/// Text used when the gateway produced no payload at all.
pub const NO_REPLY_TEXT: &str = "No response was received from the assistant. Please try again.";

/// Text used when a payload arrived but no text could be extracted from it.
pub const UNFORMATTED_REPLY_TEXT: &str =
    "I received a response but couldn't format it properly. Please try again.";

/// Keys probed for the textual answer, highest priority first.
const TEXT_KEYS: [&str; 5] = ["response", "text", "message", "answer", "content"];

/// Secondary payload field holding the agent's undecoded output.
pub const RAW_FIELD: &str = "raw";

/// What the `result` field of a payload turned out to be.
enum ResultShape {
    Structured(Map<String, Value>),
    PlainText(String),
    Missing,
}

/// Partial extraction from a candidate object.
#[derive(Default)]
struct Extracted {
    text: Option<String>,
    products: Vec<Product>,
    comparison: Option<Comparison>,
}

impl Extracted {
    /// Fills structured fields that are still empty from `other`.
    fn absorb(&mut self, other: Extracted) {
        if self.text.is_none() {
            self.text = other.text;
        }
        if self.products.is_empty() {
            self.products = other.products;
        }
        if self.comparison.is_none() {
            self.comparison = other.comparison;
        }
    }
}

/// Normalizes a raw agent reply. `None` (or JSON `null`) means the call
/// returned no payload.
pub fn normalize(reply: Option<&Value>) -> NormalizedReply {
    let payload = match reply {
        Some(Value::Null) | None => {
            debug!("agent reply carried no payload");
            return NormalizedReply::text(NO_REPLY_TEXT);
        }
        Some(payload) => payload,
    };

    let result = match payload {
        // A bare string payload is treated as if it were the `result` field.
        Value::String(_) => Some(payload),
        _ => payload.get("result"),
    };

    let mut extracted = match classify_result(result) {
        ResultShape::PlainText(text) => {
            debug!("agent result is plain text");
            return NormalizedReply::text(text);
        }
        ResultShape::Structured(candidate) => extract_candidate(&candidate),
        ResultShape::Missing => Extracted::default(),
    };

    if extracted.text.is_none() {
        extracted.text = non_empty_str(payload.get("message"));
    }

    if extracted.text.is_none() {
        if let Some(raw) = payload.get(RAW_FIELD).and_then(Value::as_str) {
            extracted.absorb(decode_raw(raw));
        }
    }

    let text = extracted.text.unwrap_or_else(|| {
        debug!("no text found in agent reply, using fallback");
        UNFORMATTED_REPLY_TEXT.to_string()
    });

    NormalizedReply {
        text,
        products: extracted.products,
        comparison: extracted.comparison,
    }
}

fn classify_result(result: Option<&Value>) -> ResultShape {
    match result {
        Some(Value::Object(map)) => ResultShape::Structured(map.clone()),
        Some(Value::String(s)) if !s.trim().is_empty() => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => ResultShape::Structured(map),
            Ok(Value::String(inner)) if !inner.trim().is_empty() => ResultShape::PlainText(inner),
            _ => ResultShape::PlainText(s.clone()),
        },
        _ => ResultShape::Missing,
    }
}

fn extract_candidate(candidate: &Map<String, Value>) -> Extracted {
    Extracted {
        text: TEXT_KEYS
            .iter()
            .find_map(|key| non_empty_str(candidate.get(*key))),
        products: extract_products(candidate.get("products")),
        comparison: extract_comparison(candidate.get("comparison")),
    }
}

/// Decodes the secondary raw payload string.
fn decode_raw(raw: &str) -> Extracted {
    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(parsed) => parsed,
        Err(_) => return verbatim(raw),
    };

    match parsed {
        Value::String(inner) => Extracted {
            text: non_empty(inner),
            ..Extracted::default()
        },
        Value::Object(obj) => {
            if let Some(text) = non_empty_str(obj.get("response")) {
                return Extracted { text: Some(text), ..Extracted::default() };
            }
            match obj.get("response").and_then(|r| r.get("result")) {
                Some(Value::String(s)) => Extracted {
                    text: non_empty(s.clone()),
                    ..Extracted::default()
                },
                Some(Value::Object(nested)) => extract_candidate(nested),
                _ => Extracted::default(),
            }
        }
        Value::Array(_) => Extracted::default(),
        _ => verbatim(raw),
    }
}

fn verbatim(raw: &str) -> Extracted {
    Extracted {
        text: non_empty(raw.to_string()),
        ..Extracted::default()
    }
}

fn extract_products(value: Option<&Value>) -> Vec<Product> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries.iter().filter_map(parse_product).collect()
}

fn parse_product(entry: &Value) -> Option<Product> {
    let obj = entry.as_object()?;
    let name = non_empty_str(obj.get("name"))?;
    Some(Product {
        name,
        description: non_empty_str(obj.get("description")),
        features: obj
            .get("features")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|f| non_empty_str(Some(f))).collect())
            .unwrap_or_default(),
        price: obj.get("price").and_then(scalar_text),
        rationale: non_empty_str(obj.get("rationale")),
    })
}

fn extract_comparison(value: Option<&Value>) -> Option<Comparison> {
    let obj = value?.as_object()?;
    let attributes = obj
        .get("attributes")?
        .as_array()?
        .iter()
        .map(|attr| scalar_text(attr).unwrap_or_else(|| attr.to_string()))
        .collect();

    let products = obj
        .get("products")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(parse_comparison_row).collect())
        .unwrap_or_default();

    Some(Comparison { attributes, products })
}

fn parse_comparison_row(row: &Value) -> Option<ComparisonRow> {
    let obj = row.as_object()?;
    let name = non_empty_str(obj.get("name"))?;
    let values = obj
        .get("values")
        .and_then(Value::as_array)
        .map(|values| values.iter().map(scalar_text).collect())
        .unwrap_or_default();
    Some(ComparisonRow { name, values })
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string).and_then(non_empty)
}

/// Scalars as display text; `null`, arrays and objects yield `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
