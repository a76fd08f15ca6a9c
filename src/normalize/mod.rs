use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TupleError {
    #[error("unrecognized format version {0}")]
    UnknownVersion(String),

    #[error("expected {expected} fields for v{version}, found {found}")]
    FieldCount {
        version: u8,
        expected: usize,
        found: usize,
    },

    #[error("invalid {field} value '{value}'")]
    Field { field: &'static str, value: String },
}

/// Closed set of supported tuple encodings. Anything else is rejected per
/// tuple rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowVersion {
    V1,
    V2,
    V3,
}

impl FlowVersion {
    /// Interpret the declared version value from the record properties.
    /// Accepts integers and strings holding integers; everything else is
    /// unrecognized.
    pub fn from_declared(value: Option<&Value>) -> Option<FlowVersion> {
        let number = match value {
            Some(Value::Number(n)) => n.as_i64()?,
            Some(Value::String(s)) => s.trim().parse::<i64>().ok()?,
            _ => return None,
        };

        match number {
            1 => Some(FlowVersion::V1),
            2 => Some(FlowVersion::V2),
            3 => Some(FlowVersion::V3),
            _ => None,
        }
    }

    /// Exact field count for this encoding. A mismatch is a per-tuple error.
    pub fn field_count(self) -> usize {
        match self {
            FlowVersion::V1 => 8,
            FlowVersion::V2 => 9,
            FlowVersion::V3 => 13,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            FlowVersion::V1 => 1,
            FlowVersion::V2 => 2,
            FlowVersion::V3 => 3,
        }
    }
}

/// Describe a declared version value for error messages.
pub fn describe_version(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(missing)".to_string(),
    }
}

/// Enclosing record and flow-group context for one tuple.
#[derive(Debug, Clone, Copy)]
pub struct TupleContext<'a> {
    pub resource_id: &'a str,
    pub category: &'a str,
    pub record_time: &'a str,
    pub rule: &'a str,
    pub mac: &'a str,
}

/// The flat output unit, one per flow tuple. Field presence is
/// version-dependent: `flowState` only for v2/v3, counters only for v3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub time: String,
    pub record_time: String,
    pub src_ip: String,
    pub dest_ip: String,
    pub src_port: String,
    pub dest_port: String,
    pub protocol: String,
    pub direction: String,
    pub decision: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_state: Option<String>,

    // A None here flattens to nothing, so v1/v2 events carry no counter keys
    #[serde(flatten)]
    pub counters: Option<FlowCounters>,

    pub flow_version: u8,
    pub resource_id: String,
    pub category: String,
    pub rule: String,
    pub mac: String,
}

/// v3 traffic counters. Each is nullable: an empty field means unknown, not
/// zero, and serializes as null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowCounters {
    pub packets_sent: Option<u64>,
    pub bytes_sent: Option<u64>,
    pub packets_received: Option<u64>,
    pub bytes_received: Option<u64>,
}

/// Canonicalize a MAC address to uppercase hex with no separators.
pub fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn split_tuple(tuple: &str) -> Vec<&str> {
    // Comma is the wire delimiter; fall back to whitespace for documents
    // that arrive with the fields already space-separated.
    if tuple.contains(',') {
        tuple.split(',').map(str::trim).collect()
    } else {
        tuple.split_whitespace().collect()
    }
}

fn epoch_to_iso8601(field: &str) -> Result<String, TupleError> {
    let secs: i64 = field.parse().map_err(|_| TupleError::Field {
        field: "timestamp",
        value: field.to_string(),
    })?;

    let time = DateTime::from_timestamp(secs, 0).ok_or_else(|| TupleError::Field {
        field: "timestamp",
        value: field.to_string(),
    })?;

    Ok(time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn expand_protocol(code: &str) -> Result<&'static str, TupleError> {
    match code {
        "T" => Ok("TCP"),
        "U" => Ok("UDP"),
        _ => Err(TupleError::Field {
            field: "protocol",
            value: code.to_string(),
        }),
    }
}

fn expand_direction(code: &str) -> Result<&'static str, TupleError> {
    match code {
        "I" => Ok("Inbound"),
        "O" => Ok("Outbound"),
        _ => Err(TupleError::Field {
            field: "direction",
            value: code.to_string(),
        }),
    }
}

fn expand_decision(code: &str) -> Result<&'static str, TupleError> {
    match code {
        "A" => Ok("Allow"),
        "D" => Ok("Deny"),
        _ => Err(TupleError::Field {
            field: "decision",
            value: code.to_string(),
        }),
    }
}

fn expand_flow_state(code: &str) -> Result<&'static str, TupleError> {
    match code {
        "B" => Ok("Begin"),
        "C" => Ok("Continuing"),
        "E" => Ok("End"),
        _ => Err(TupleError::Field {
            field: "flow state",
            value: code.to_string(),
        }),
    }
}

fn parse_counter(field: &str, name: &'static str) -> Result<Option<u64>, TupleError> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<u64>()
        .map(Some)
        .map_err(|_| TupleError::Field {
            field: name,
            value: field.to_string(),
        })
}

fn validate_port(field: &str, name: &'static str) -> Result<(), TupleError> {
    field
        .parse::<u64>()
        .map(|_| ())
        .map_err(|_| TupleError::Field {
            field: name,
            value: field.to_string(),
        })
}

/// Map one raw flow tuple onto a `NormalizedEvent` using the declared
/// version's field layout. Deterministic: identical input always yields an
/// identical event.
pub fn normalize_tuple(
    tuple: &str,
    version: FlowVersion,
    ctx: &TupleContext<'_>,
) -> Result<NormalizedEvent, TupleError> {
    let fields = split_tuple(tuple);
    let expected = version.field_count();
    if fields.len() != expected {
        return Err(TupleError::FieldCount {
            version: version.number(),
            expected,
            found: fields.len(),
        });
    }

    // Common v1/v2/v3 prefix: ts, srcIp, destIp, srcPort, destPort,
    // protocol, direction, decision.
    let time = epoch_to_iso8601(fields[0])?;
    validate_port(fields[3], "source port")?;
    validate_port(fields[4], "destination port")?;
    let protocol = expand_protocol(fields[5])?;
    let direction = expand_direction(fields[6])?;
    let decision = expand_decision(fields[7])?;

    let flow_state = match version {
        FlowVersion::V1 => None,
        FlowVersion::V2 | FlowVersion::V3 => Some(expand_flow_state(fields[8])?.to_string()),
    };

    let counters = match version {
        FlowVersion::V3 => Some(FlowCounters {
            packets_sent: parse_counter(fields[9], "packets sent")?,
            bytes_sent: parse_counter(fields[10], "bytes sent")?,
            packets_received: parse_counter(fields[11], "packets received")?,
            bytes_received: parse_counter(fields[12], "bytes received")?,
        }),
        _ => None,
    };

    Ok(NormalizedEvent {
        time,
        record_time: ctx.record_time.to_string(),
        src_ip: fields[1].to_string(),
        dest_ip: fields[2].to_string(),
        // Ports keep their original textual form
        src_port: fields[3].to_string(),
        dest_port: fields[4].to_string(),
        protocol: protocol.to_string(),
        direction: direction.to_string(),
        decision: decision.to_string(),
        flow_state,
        counters,
        flow_version: version.number(),
        resource_id: ctx.resource_id.to_string(),
        category: ctx.category.to_string(),
        rule: ctx.rule.to_string(),
        mac: ctx.mac.to_string(),
    })
}
