use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("document schema error: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Parsed root of a flow-log document.
///
/// Fields outside the documented schema are captured verbatim in `extra`
/// rather than rejected, so newer document revisions keep flowing through.
#[derive(Debug, Clone, Deserialize)]
pub struct LogDocument {
    pub records: Vec<LogRecord>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogDocument {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    /// Record-level timestamp, preserved in its original textual form.
    pub time: String,

    #[serde(rename = "resourceId")]
    pub resource_id: String,

    pub category: String,

    #[serde(default)]
    pub properties: RecordProperties,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordProperties {
    /// Declared tuple format version. Kept as a raw JSON value so that an
    /// unrecognized or oddly typed version skips the record instead of
    /// failing the whole document.
    #[serde(rename = "Version", alias = "version", alias = "V")]
    pub version: Option<Value>,

    #[serde(default)]
    pub flows: Vec<RuleFlows>,

    /// Some v3 emitters put tuples directly under properties with no
    /// per-rule grouping.
    #[serde(rename = "flowTuples", default)]
    pub flow_tuples: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outer grouping level: all flows matched by one rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleFlows {
    #[serde(default, alias = "ruleName")]
    pub rule: Option<String>,

    #[serde(default)]
    pub flows: Vec<InnerFlow>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inner grouping level: flows observed on one interface.
#[derive(Debug, Clone, Deserialize)]
pub struct InnerFlow {
    #[serde(default)]
    pub mac: Option<String>,

    #[serde(rename = "flowTuples", default)]
    pub flow_tuples: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Flattened view of one (rule, mac, tuples) grouping within a record.
#[derive(Debug, Clone, Copy)]
pub struct FlowGroup<'a> {
    pub rule: &'a str,
    pub mac: &'a str,
    pub tuples: &'a [String],
}

impl LogRecord {
    /// Flatten the two-level rule/interface nesting into flow groups, in
    /// document order. Falls back to the bare `properties.flowTuples` shape
    /// when no per-rule grouping is present.
    pub fn flow_groups(&self) -> Vec<FlowGroup<'_>> {
        let mut groups = Vec::new();

        for rule_flows in &self.properties.flows {
            let rule = rule_flows.rule.as_deref().unwrap_or("");
            for inner in &rule_flows.flows {
                groups.push(FlowGroup {
                    rule,
                    mac: inner.mac.as_deref().unwrap_or(""),
                    tuples: &inner.flow_tuples,
                });
            }
        }

        if groups.is_empty() && !self.properties.flow_tuples.is_empty() {
            groups.push(FlowGroup {
                rule: "",
                mac: "",
                tuples: &self.properties.flow_tuples,
            });
        }

        groups
    }
}

/// Parse decoded text into a `LogDocument`.
///
/// Empty or whitespace-only text is a valid no-op document. Unparsable JSON
/// is `Malformed`; valid JSON missing the required fields is `Schema`. Tuple
/// contents are not validated here.
pub fn parse_document(text: &str) -> Result<LogDocument, DocumentError> {
    if text.trim().is_empty() {
        tracing::warn!("document is empty after decoding");
        return Ok(LogDocument::empty());
    }

    let value: Value = serde_json::from_str(text).map_err(DocumentError::Malformed)?;
    serde_json::from_value(value).map_err(DocumentError::Schema)
}
