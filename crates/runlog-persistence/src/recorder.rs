//! Dispatcher de eventos: punto de entrada del pipeline de ingesta.
//!
//! Objetivo general del módulo:
//! - `RunRecorder` recibe un registro crudo por vez, resuelve el handler por
//!   kind y lo ejecuta dentro de una sesión con alcance de UN evento:
//!   commit o rollback por registro, nunca transacciones abiertas entre
//!   eventos.
//! - Ningún error escapa de `on_event`: toda falla (parseo, ancestro
//!   ausente, base) se convierte en una `InternalFailure` observable y la
//!   corrida continúa con el siguiente registro.
//! - Los registros sin campo `event` textual y los kinds sin handler se
//!   descartan en silencio.
//! - `close()` reconcilia el estado terminal del workflow: SUCCESS salvo que
//!   algún error lo haya degradado antes (un estado terminal no se pisa).
//!
//! Garantías:
//! - Las fallas transitorias de SQLite (lock/busy) se reintentan con backoff
//!   repitiendo la unidad transaccional completa; las semánticas (parseo,
//!   ancestros) no se reintentan jamás.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use diesel::prelude::*;
use log::{debug, error, warn};
use runlog_core::{EventKind, EventRecord, Status};

use crate::context::RunContext;
use crate::db::DatabaseManager;
use crate::error::PersistenceError;
use crate::handlers::{default_handlers, EventHandler};
use crate::queries;
use crate::schema::workflows;

/// Configuración del recorder: destino de la base y bandera dry-run.
#[derive(Debug, Clone, Default)]
pub struct RecorderSettings {
    /// Ruta del archivo SQLite; `None` resuelve por entorno o default.
    pub db_path: Option<PathBuf>,
    /// Se copia a la fila del workflow; no altera el procesamiento.
    pub dryrun: bool,
}

/// Falla interna auto-descriptiva: etapa, kind involucrado (si lo hay) y
/// mensaje. Se acumulan en el recorder y se emiten por el log.
#[derive(Debug, Clone)]
pub struct InternalFailure {
    pub stage: &'static str,
    pub kind: Option<EventKind>,
    pub message: String,
}

impl fmt::Display for InternalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{} (kind={}): {}", self.stage, kind.label(), self.message),
            None => write!(f, "{}: {}", self.stage, self.message),
        }
    }
}

/// Dispatcher con estado de una corrida completa.
pub struct RunRecorder {
    db: DatabaseManager,
    handlers: HashMap<EventKind, Box<dyn EventHandler>>,
    context: RunContext,
    failures: Vec<InternalFailure>,
}

impl RunRecorder {
    /// Abre la base (creando directorios y esquema si hace falta) y deja el
    /// contexto de corrida en cero.
    pub fn new(settings: RecorderSettings) -> Result<Self, PersistenceError> {
        let db = DatabaseManager::open(settings.db_path.as_deref())?;
        db.initialize_schema()?;
        Ok(Self { db,
                  handlers: default_handlers(),
                  context: RunContext::new(settings.dryrun),
                  failures: Vec::new() })
    }

    /// Variante sobre una base en memoria (tests, corridas descartables).
    pub fn in_memory(dryrun: bool) -> Result<Self, PersistenceError> {
        let db = DatabaseManager::in_memory()?;
        db.initialize_schema()?;
        Ok(Self { db,
                  handlers: default_handlers(),
                  context: RunContext::new(dryrun),
                  failures: Vec::new() })
    }

    /// Procesa un registro crudo. Nunca devuelve error: los descartes son
    /// silenciosos y las fallas quedan en el canal interno.
    pub fn on_event(&mut self, record: &EventRecord) {
        let Some(kind) = record.kind() else {
            return; // el registro no lleva campo `event` textual
        };
        let Some(handler) = self.handlers.get(&kind) else {
            debug!("on_event:drop unregistered kind={}", kind.label());
            return;
        };
        debug!("on_event:start kind={}", kind.label());
        let db = &self.db;
        let context = &mut self.context;
        let result = with_retry(|| {
            db.session_scope(|conn| handler.handle(record, conn, &mut *context))
        });
        match result {
            Ok(()) => debug!("on_event:done kind={}", kind.label()),
            Err(err) => self.report_failure("event handling failed", Some(kind), &err),
        }
    }

    /// Cierre del pipeline. Si hubo workflow, lo deja en SUCCESS con
    /// `end_time`, salvo que ya esté en ERROR. Sin workflow, no-op.
    pub fn close(&mut self) {
        let Some(workflow_id) = self.context.current_workflow_id else {
            debug!("close:noop no workflow recorded");
            return;
        };
        let id_text = workflow_id.to_string();
        let result = with_retry(|| {
            self.db.session_scope(|conn| {
                let Some(workflow) = queries::get_workflow(conn, &id_text)? else {
                    debug!("close:noop workflow row missing workflow_id={id_text}");
                    return Ok(());
                };
                if workflow.status != Status::Error.as_str() {
                    diesel::update(workflows::table.filter(workflows::id.eq(&id_text)))
                        .set((workflows::status.eq(Status::Success.as_str()),
                              workflows::end_time.eq(Some(Utc::now().naive_utc()))))
                        .execute(conn)?;
                }
                Ok(())
            })
        });
        match result {
            Ok(()) => debug!("close:done workflow_id={id_text}"),
            Err(err) => self.report_failure("workflow close failed", None, &err),
        }
    }

    /// Fallas internas acumuladas, en orden de aparición.
    pub fn failures(&self) -> &[InternalFailure] {
        &self.failures
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Acceso a la base del recorder (consultas de verificación).
    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    fn report_failure(&mut self, stage: &'static str, kind: Option<EventKind>, err: &PersistenceError) {
        let failure = InternalFailure { stage,
                                        kind,
                                        message: err.to_string() };
        error!("{failure}");
        self.failures.push(failure);
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
/// En SQLite la clase relevante es la contención del archivo (lock/busy);
/// los errores semánticos nunca se reintentan.
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("database is locked")
            || m.contains("database table is locked")
            || m.contains("disk i/o error")
        }
        _ => false,
    }
}

/// Retry simple con backoff muy pequeño (hasta 3 reintentos).
/// No altera semántica de negocio; sólo repite la unidad de trabajo provista
/// por `f`.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification_covers_lock_errors() {
        assert!(is_retryable(&PersistenceError::TransientIo("pool error".into())));
        assert!(is_retryable(&PersistenceError::Unknown("database is locked".into())));
        assert!(!is_retryable(&PersistenceError::NotFound));
        assert!(!is_retryable(&PersistenceError::MissingAncestor { entity: "job",
                                                                   key: "1".into() }));
        assert!(!is_retryable(&PersistenceError::Unknown("otra cosa".into())));
    }

    #[test]
    fn with_retry_repeats_only_transient_failures() {
        let mut calls = 0;
        let result: Result<u32, _> = with_retry(|| {
            calls += 1;
            if calls < 3 {
                Err(PersistenceError::Unknown("database is locked".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);

        let mut calls = 0;
        let result: Result<u32, _> = with_retry(|| {
            calls += 1;
            Err(PersistenceError::NotFound)
        });
        assert!(matches!(result, Err(PersistenceError::NotFound)));
        assert_eq!(calls, 1);
    }
}
