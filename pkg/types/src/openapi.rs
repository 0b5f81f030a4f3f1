use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A probed API description document, classified by shape.
///
/// Anything that is neither a well-formed OpenAPI 3.x nor Swagger 2.0
/// document is rejected at classification time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "document", rename_all = "lowercase")]
pub enum OpenApiDocument {
    /// OpenAPI 3.x (`openapi` field with a `3.` prefix).
    OpenApi3(Value),
    /// Swagger 2.0 (`swagger == "2.0"`).
    Swagger2(Value),
}

impl OpenApiDocument {
    /// Classify a JSON document. Returns `None` for anything that does not
    /// satisfy the acceptance predicate:
    /// `openapi` starting with `"3."` plus non-empty `info` and `paths`
    /// objects, or `swagger == "2.0"` plus the same.
    pub fn classify(doc: Value) -> Option<Self> {
        if !has_content(&doc, "info") || !has_content(&doc, "paths") {
            return None;
        }
        let is_v3 = doc
            .get("openapi")
            .and_then(Value::as_str)
            .is_some_and(|v| v.starts_with("3."));
        if is_v3 {
            return Some(Self::OpenApi3(doc));
        }
        let is_v2 = doc.get("swagger").and_then(Value::as_str) == Some("2.0");
        if is_v2 {
            return Some(Self::Swagger2(doc));
        }
        None
    }

    /// Declared specification version, e.g. `"3.0.2"` or `"2.0"`.
    pub fn version(&self) -> &str {
        match self {
            Self::OpenApi3(doc) => doc.get("openapi").and_then(Value::as_str).unwrap_or("3.x"),
            Self::Swagger2(_) => "2.0",
        }
    }

    /// Title from the document's `info` block, if declared.
    pub fn title(&self) -> Option<&str> {
        let doc = match self {
            Self::OpenApi3(doc) | Self::Swagger2(doc) => doc,
        };
        doc.get("info")?.get("title")?.as_str()
    }
}

/// True iff `field` is a JSON object with at least one key.
fn has_content(doc: &Value, field: &str) -> bool {
    doc.get(field)
        .and_then(Value::as_object)
        .is_some_and(|m| !m.is_empty())
}
