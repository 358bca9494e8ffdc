//! Parse a definition document into the typed definition model.
//!
//! Parsing is deliberately lenient about scalar shapes: integers may be given
//! as JSON numbers or numeric strings, and out-of-range values fall back to
//! their defaults. Structural problems (no `payloads`, a payload without
//! `path`, an unknown variable `type`, ...) are configuration errors.

use crate::definition::{
    validate_format, ConnectionSettings, Definition, FormattingOptions, PayloadDefinition,
    PayloadExportDefinition, RandomValueDefinition, RouteDefaults, VariableDefinition,
    VariableMap, DEFAULT_TEXT_LENGTH,
};
use crate::document::DefinitionDocument;
use crate::error::DefinitionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

type Object = Map<String, Value>;

/// Build a [`Definition`] from a parsed document.
///
/// Template files are read eagerly, relative to the document's directory, and
/// every payload is repeated `count` times in the returned per-iteration list.
pub fn load(document: DefinitionDocument) -> Result<Definition, DefinitionError> {
    let base_dir = document.base_dir();
    let root = document
        .root()
        .as_object()
        .ok_or(DefinitionError::NotAnObject)?;

    let payload_nodes = root
        .get("payloads")
        .and_then(Value::as_array)
        .ok_or(DefinitionError::MissingPayloads)?;

    let connection = parse_connection(root)?;
    let routes = parse_routes(root);
    let iterations = parse_count(root.get("count"));
    let threads = parse_threads(root.get("threads"));
    let formatting = parse_formatting(root.get("formatting"))?;
    let global_variables = parse_variables(root.get("variables"))?;
    let default_export = parse_export(root.get("export"), &base_dir, None)?;

    let mut payloads = Vec::new();
    for node in payload_nodes {
        let payload = Arc::new(parse_payload(
            node,
            &base_dir,
            &global_variables,
            default_export.as_ref(),
        )?);
        debug!(
            "Loaded payload '{}' (count {}, {} variable(s))",
            payload.file_name(),
            payload.count,
            payload.variables.len()
        );
        for _ in 0..payload.count {
            payloads.push(Arc::clone(&payload));
        }
    }

    Ok(Definition {
        document,
        connection,
        routes,
        iterations,
        threads,
        formatting,
        global_variables,
        default_export,
        payloads,
    })
}

// ============================================================================
// Top level
// ============================================================================

fn parse_connection(root: &Object) -> Result<ConnectionSettings, DefinitionError> {
    let mut settings = ConnectionSettings::default();

    if let Some(protocol) = non_empty_string(root, "protocol") {
        settings.protocol = protocol.parse()?;
    }
    if let Some(server) = non_empty_string(root, "server") {
        settings.server = server;
    }
    if let Some(user) = non_empty_string(root, "user") {
        settings.user = user;
    }
    if let Some(password) = non_empty_string(root, "password") {
        settings.password = password;
    }
    if let Some(vhost) = non_empty_string(root, "vhost") {
        settings.vhost = vhost;
    }
    settings.port = read_i64(root.get("port"))
        .filter(|p| *p > 0)
        .and_then(|p| u16::try_from(p).ok());
    settings.mqtt_protocol_version = non_empty_string(root, "mqttProtocolVersion");

    Ok(settings)
}

fn parse_routes(root: &Object) -> RouteDefaults {
    RouteDefaults {
        exchange: root.get("exchange").and_then(scalar_text).unwrap_or_default(),
        routing_key: non_empty_string(root, "routingKey"),
        message_type: root
            .get("messageType")
            .and_then(scalar_text)
            .unwrap_or_default(),
    }
}

/// `count` must be a positive integer; anything else is 1.
fn parse_count(node: Option<&Value>) -> u32 {
    read_i64(node)
        .filter(|c| *c >= 1)
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(1)
}

/// `threads` must be a non-negative integer; anything else is 0 (auto).
fn parse_threads(node: Option<&Value>) -> usize {
    read_i64(node)
        .filter(|t| *t >= 0)
        .and_then(|t| usize::try_from(t).ok())
        .unwrap_or(0)
}

fn parse_formatting(node: Option<&Value>) -> Result<FormattingOptions, DefinitionError> {
    let mut formatting = FormattingOptions::default();
    let Some(obj) = node.and_then(Value::as_object) else {
        return Ok(formatting);
    };

    if let Some(date) = non_empty_string(obj, "date") {
        formatting.date = date;
    }
    if let Some(time) = non_empty_string(obj, "time") {
        formatting.time = time;
    }
    if let Some(datetime) = non_empty_string(obj, "datetime") {
        formatting.datetime = datetime;
    }

    validate_format(&formatting.date)?;
    validate_format(&formatting.time)?;
    validate_format(&formatting.datetime)?;
    Ok(formatting)
}

// ============================================================================
// Payloads
// ============================================================================

fn parse_payload(
    node: &Value,
    base_dir: &Path,
    globals: &VariableMap,
    default_export: Option<&PayloadExportDefinition>,
) -> Result<PayloadDefinition, DefinitionError> {
    match node {
        Value::String(relative) => {
            let path = base_dir.join(relative);
            let template = read_template(&path)?;

            Ok(PayloadDefinition {
                variables: globals.clone(),
                export: default_export.cloned(),
                ..PayloadDefinition::new(path, template)
            })
        }
        Value::Object(obj) => {
            let relative = obj
                .get("path")
                .and_then(scalar_text)
                .ok_or(DefinitionError::MissingPayloadPath)?;
            let path = base_dir.join(relative);

            let own_variables = parse_variables(obj.get("variables"))?;
            let export = parse_export(obj.get("export"), base_dir, default_export)?;
            let template = read_template(&path)?;

            Ok(PayloadDefinition {
                path,
                template,
                count: parse_count(obj.get("count")),
                variables: globals.merged_with(&own_variables),
                export,
                exchange: non_empty_string(obj, "exchange"),
                routing_key: non_empty_string(obj, "routingKey"),
                message_type: non_empty_string(obj, "messageType"),
            })
        }
        _ => Err(DefinitionError::UnsupportedPayloadEntry),
    }
}

fn read_template(path: &Path) -> Result<String, DefinitionError> {
    fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an export node.
///
/// An absent node inherits `fallback`; `enabled: false` yields an explicitly
/// disabled rule so an outer default does not apply.
fn parse_export(
    node: Option<&Value>,
    base_dir: &Path,
    fallback: Option<&PayloadExportDefinition>,
) -> Result<Option<PayloadExportDefinition>, DefinitionError> {
    let node = match node {
        None | Some(Value::Null) => return Ok(fallback.cloned()),
        Some(node) => node,
    };
    let obj = node.as_object().ok_or(DefinitionError::InvalidExport)?;

    if !read_bool(obj, "enabled") {
        return Ok(Some(PayloadExportDefinition::disabled(base_dir)));
    }

    let template =
        non_empty_string(obj, "template").ok_or(DefinitionError::MissingExportTemplate)?;
    Ok(Some(PayloadExportDefinition::enabled(
        template,
        base_dir,
        read_bool(obj, "overwrite"),
    )))
}

// ============================================================================
// Variables
// ============================================================================

/// Parse a variables object into a case-insensitive map. Null entries are
/// skipped.
pub fn parse_variables(node: Option<&Value>) -> Result<VariableMap, DefinitionError> {
    let mut variables = VariableMap::new();
    let Some(obj) = node.and_then(Value::as_object) else {
        return Ok(variables);
    };

    for (name, value) in obj {
        if value.is_null() {
            continue;
        }
        variables.insert(name, parse_variable(name, value)?);
    }

    Ok(variables)
}

fn parse_variable(name: &str, node: &Value) -> Result<VariableDefinition, DefinitionError> {
    let obj = match node {
        Value::Object(obj) => obj,
        Value::Array(_) => return Err(DefinitionError::UnsupportedVariable(name.to_string())),
        literal => {
            let text = scalar_text(literal).unwrap_or_default();
            return Ok(VariableDefinition::Template(text));
        }
    };

    let Some(kind) = obj.get("type").filter(|t| !t.is_null()) else {
        // Untyped objects are literals when they carry a `value`.
        return match obj.get("value").filter(|v| !v.is_null()) {
            Some(value) => Ok(VariableDefinition::Template(
                scalar_text(value).unwrap_or_default(),
            )),
            None => Err(DefinitionError::MissingVariableType(name.to_string())),
        };
    };

    let kind = kind
        .as_str()
        .map(|k| k.trim().to_lowercase())
        .ok_or_else(|| DefinitionError::MissingVariableType(name.to_string()))?;

    let definition = match kind.as_str() {
        "number" => parse_number(obj),
        "text" => RandomValueDefinition::Text {
            length: read_i64(obj.get("length"))
                .map(|l| l.max(1) as usize)
                .unwrap_or(DEFAULT_TEXT_LENGTH),
        },
        "guid" => RandomValueDefinition::Guid,
        "ulid" => RandomValueDefinition::Ulid,
        "datetime" => RandomValueDefinition::DateTime {
            from: read_date_bound(obj, "from", parse_datetime),
            to: read_date_bound(obj, "to", parse_datetime),
            format: read_format(obj)?,
        },
        "date" => RandomValueDefinition::Date {
            from: read_date_bound(obj, "from", parse_date),
            to: read_date_bound(obj, "to", parse_date),
            format: read_format(obj)?,
        },
        "time" => RandomValueDefinition::Time {
            from: read_date_bound(obj, "from", parse_time),
            to: read_date_bound(obj, "to", parse_time),
            format: read_format(obj)?,
        },
        "sequence" => RandomValueDefinition::Sequence {
            start: read_i64(obj.get("start")).unwrap_or(1),
            step: read_i64(obj.get("step")).unwrap_or(1).max(1),
            padding: read_padding(obj),
            update: read_bool(obj, "update"),
        },
        "fixed" => {
            let value = obj
                .get("value")
                .and_then(scalar_text)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| DefinitionError::MissingFixedValue(name.to_string()))?;
            return Ok(VariableDefinition::Template(value));
        }
        other => {
            return Err(DefinitionError::UnsupportedVariableType {
                name: name.to_string(),
                kind: other.to_string(),
            })
        }
    };

    Ok(VariableDefinition::Random(definition))
}

fn parse_number(obj: &Object) -> RandomValueDefinition {
    let mut min = read_i64(obj.get("min")).unwrap_or(1);
    let mut max = read_i64(obj.get("max")).unwrap_or(100);
    if max < min {
        std::mem::swap(&mut min, &mut max);
    }

    RandomValueDefinition::Number {
        min,
        max,
        padding: read_padding(obj),
    }
}

/// Padding below 1 means "no padding".
fn read_padding(obj: &Object) -> Option<usize> {
    read_i64(obj.get("padding"))
        .filter(|p| *p >= 1)
        .and_then(|p| usize::try_from(p).ok())
}

fn read_format(obj: &Object) -> Result<Option<String>, DefinitionError> {
    let format = non_empty_string(obj, "format");
    if let Some(format) = &format {
        validate_format(format)?;
    }
    Ok(format)
}

fn read_date_bound<T>(obj: &Object, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = non_empty_string(obj, key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("Could not parse '{}' value '{}', using the default", key, raw);
    }
    parsed
}

/// Parse a timestamp: RFC 3339, a naive timestamp (UTC assumed) or a date.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a date, accepting full timestamps by dropping the time part.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

// ============================================================================
// Scalar helpers
// ============================================================================

/// Text form of a scalar node. Objects and arrays render as compact JSON.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Trimmed string value of `key`, or `None` when absent or blank.
fn non_empty_string(obj: &Object, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(scalar_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Integer from a JSON number or a numeric string.
pub(crate) fn read_i64(node: Option<&Value>) -> Option<i64> {
    match node? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// True only for a JSON `true`.
pub(crate) fn read_bool(obj: &Object, key: &str) -> bool {
    matches!(obj.get(key), Some(Value::Bool(true)))
}
