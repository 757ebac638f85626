//! Estado compartido de la corrida en curso.

use uuid::Uuid;

use crate::error::PersistenceError;

/// Contexto mutable que viaja por todos los handlers de una corrida.
///
/// Contrato:
/// - Se construye junto con el recorder y vive tanto como él.
/// - Sólo el handler de `workflow_started` escribe `current_workflow_id`;
///   el resto lo lee para correlacionar sus filas.
/// - `dryrun` llega de la configuración del host, no de los eventos.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub current_workflow_id: Option<Uuid>,
    pub dryrun: bool,
}

impl RunContext {
    pub fn new(dryrun: bool) -> Self {
        Self { current_workflow_id: None, dryrun }
    }

    /// Id del workflow activo, o falla de ancestro si todavía no se procesó
    /// ningún `workflow_started`.
    pub fn require_workflow_id(&self) -> Result<Uuid, PersistenceError> {
        self.current_workflow_id.ok_or(PersistenceError::MissingAncestor {
            entity: "workflow",
            key: "current run".to_string(),
        })
    }
}
