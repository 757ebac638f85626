//! Errores de parseo del modelo de eventos.
//!
//! Son errores puros (sin I/O): describen por qué un registro crudo no pudo
//! convertirse en un evento tipado. La capa de persistencia decide qué hacer
//! con ellos; aquí sólo se nombran campo y causa.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}
