//! Registro crudo de evento y reglas de coerción de campos.
//!
//! Rol en el pipeline:
//! - `EventRecord` envuelve el objeto JSON entregado por el motor huésped.
//!   Ninguna clave está garantizada y los valores llegan sin tipar.
//! - Los accesores `opt_*` / `require_*` concentran las coerciones del
//!   modelo: timestamps como epoch o ISO-8601, enteros como número o cadena
//!   numérica, UUIDs como texto.
//! - Campo ausente y campo en `null` se tratan igual (valor no provisto).
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::ParseError;

use super::kind::EventKind;

/// Registro crudo: mapa campo -> valor, sin garantías de presencia ni tipo.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    fields: Map<String, Value>,
}

impl EventRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Construye desde un `Value` arbitrario; sólo los objetos JSON son
    /// registros válidos.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(invalid(
                "record",
                format!("expected JSON object, got {}", type_name(&other)),
            )),
        }
    }

    /// Kind declarado en el campo `event`, si existe y es texto. Un campo
    /// `event` no textual equivale a ausente: el registro no es un evento.
    pub fn kind(&self) -> Option<EventKind> {
        self.fields
            .get("event")
            .and_then(Value::as_str)
            .map(EventKind::from_label)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn opt_str(&self, field: &'static str) -> Result<Option<String>, ParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(invalid(
                field,
                format!("expected string, got {}", type_name(other)),
            )),
        }
    }

    pub fn require_str(&self, field: &'static str) -> Result<String, ParseError> {
        self.opt_str(field)?
            .ok_or(ParseError::MissingField { field })
    }

    pub fn opt_i64(&self, field: &'static str) -> Result<Option<i64>, ParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => coerce_i64(field, value).map(Some),
        }
    }

    pub fn require_i64(&self, field: &'static str) -> Result<i64, ParseError> {
        self.opt_i64(field)?
            .ok_or(ParseError::MissingField { field })
    }

    pub fn opt_u64(&self, field: &'static str) -> Result<Option<u64>, ParseError> {
        match self.opt_i64(field)? {
            None => Ok(None),
            Some(n) if n >= 0 => Ok(Some(n as u64)),
            Some(n) => Err(invalid(field, format!("expected non-negative integer, got {n}"))),
        }
    }

    pub fn require_u64(&self, field: &'static str) -> Result<u64, ParseError> {
        self.opt_u64(field)?
            .ok_or(ParseError::MissingField { field })
    }

    pub fn opt_bool(&self, field: &'static str) -> Result<Option<bool>, ParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(invalid(
                field,
                format!("expected bool, got {}", type_name(other)),
            )),
        }
    }

    /// Payload JSON arbitrario del campo, clonado tal cual (sin coerción).
    pub fn opt_json(&self, field: &str) -> Option<Value> {
        self.fields.get(field).filter(|v| !v.is_null()).cloned()
    }

    /// Lista de ids enteros; cada elemento acepta número o cadena numérica.
    pub fn opt_i64_list(&self, field: &'static str) -> Result<Option<Vec<i64>>, ParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| coerce_i64(field, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(invalid(
                field,
                format!("expected array, got {}", type_name(other)),
            )),
        }
    }

    /// Timestamp como epoch (entero o flotante, en segundos) o como texto
    /// ISO-8601 / RFC 3339. Siempre se normaliza a UTC.
    pub fn opt_timestamp(&self, field: &'static str) -> Result<Option<DateTime<Utc>>, ParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => coerce_timestamp(field, value).map(Some),
        }
    }

    pub fn opt_uuid(&self, field: &'static str) -> Result<Option<Uuid>, ParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Uuid::parse_str(s.trim())
                .map(Some)
                .map_err(|e| invalid(field, format!("not a UUID: {e}"))),
            Some(other) => Err(invalid(
                field,
                format!("expected UUID string, got {}", type_name(other)),
            )),
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ParseError {
    ParseError::InvalidField { field, reason }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_i64(field: &'static str, value: &Value) -> Result<i64, ParseError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| invalid(field, format!("expected integer, got {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| invalid(field, format!("not an integer: {e}"))),
        other => Err(invalid(
            field,
            format!("expected integer, got {}", type_name(other)),
        )),
    }
}

fn coerce_timestamp(field: &'static str, value: &Value) -> Result<DateTime<Utc>, ParseError> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| invalid(field, format!("epoch out of range: {secs}")))
            } else if let Some(secs) = n.as_f64() {
                Utc.timestamp_millis_opt((secs * 1000.0).round() as i64)
                    .single()
                    .ok_or_else(|| invalid(field, format!("epoch out of range: {secs}")))
            } else {
                Err(invalid(field, format!("expected epoch seconds, got {n}")))
            }
        }
        Value::String(s) => parse_timestamp_text(s.trim())
            .ok_or_else(|| invalid(field, format!("not a timestamp: '{s}'"))),
        other => Err(invalid(
            field,
            format!(
                "expected epoch seconds or ISO-8601 string, got {}",
                type_name(other)
            ),
        )),
    }
}

// Acepta RFC 3339 con zona y las variantes naive más comunes (separador 'T'
// o espacio); las naive se interpretan como UTC.
fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}
