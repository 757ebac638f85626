//! Handlers de persistencia, uno por kind de evento.
//!
//! Objetivo general del módulo:
//! - Cada handler traduce un evento tipado a escrituras relacionales sobre
//!   una sesión YA abierta (el dispatcher es dueño del límite transaccional:
//!   cualquier `Err` devuelto aquí revierte el evento completo).
//! - La tabla `default_handlers` es el registro kind -> handler. Un kind sin
//!   entrada se descarta silenciosamente en el dispatcher.
//! - Los handlers no conocen el pool ni el retry; sólo conexión, registro y
//!   contexto de corrida.

mod group;
mod job;
mod workflow;

use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use runlog_core::{EventKind, EventRecord, JobStatus, Status};

use crate::context::RunContext;
use crate::error::PersistenceError;
use crate::models::NewErrorRow;
use crate::schema::{errors, workflows};

pub use group::{GroupErrorHandler, GroupInfoHandler};
pub use job::{JobErrorHandler, JobFinishedHandler, JobInfoHandler, JobStartedHandler};
pub use workflow::{ErrorHandler, RuleGraphHandler, WorkflowStartedHandler};

/// Handler de persistencia para un kind de evento.
pub trait EventHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError>;
}

/// Registro kind -> handler con los nueve kinds que tocan la base.
/// Los kinds informativos (`shellcmd`, `progress`, etc.) no se registran.
pub fn default_handlers() -> HashMap<EventKind, Box<dyn EventHandler>> {
    let mut handlers: HashMap<EventKind, Box<dyn EventHandler>> = HashMap::new();
    handlers.insert(EventKind::WorkflowStarted, Box::new(WorkflowStartedHandler));
    handlers.insert(EventKind::JobInfo, Box::new(JobInfoHandler));
    handlers.insert(EventKind::JobStarted, Box::new(JobStartedHandler));
    handlers.insert(EventKind::JobFinished, Box::new(JobFinishedHandler));
    handlers.insert(EventKind::JobError, Box::new(JobErrorHandler));
    handlers.insert(EventKind::GroupInfo, Box::new(GroupInfoHandler));
    handlers.insert(EventKind::GroupError, Box::new(GroupErrorHandler));
    handlers.insert(EventKind::RuleGraph, Box::new(RuleGraphHandler));
    handlers.insert(EventKind::Error, Box::new(ErrorHandler));
    handlers
}

/// Un estado textual de job/grupo terminal no se vuelve a tocar.
pub(crate) fn is_terminal_status(status: &str) -> bool {
    JobStatus::from_str(status).map_or(false, |s| s.is_terminal())
}

/// Inserta una fila en `errors` (append-only).
pub(crate) fn insert_workflow_error(conn: &mut SqliteConnection,
                                    workflow_id: &str,
                                    message: &str,
                                    traceback: Option<&str>,
                                    job_id: Option<i32>,
                                    group_id: Option<i32>,
                                    at: NaiveDateTime)
                                    -> Result<(), PersistenceError> {
    let row = NewErrorRow { workflow_id,
                            message,
                            traceback,
                            job_id,
                            group_id,
                            created_at: at };
    diesel::insert_into(errors::table).values(&row).execute(conn)?;
    Ok(())
}

/// Degrada el workflow a ERROR y fija `end_time` una sola vez: el filtro por
/// estado hace que gane el primer error y que el cierre no lo pise.
pub(crate) fn mark_workflow_error(conn: &mut SqliteConnection,
                                  workflow_id: &str,
                                  at: NaiveDateTime)
                                  -> Result<(), PersistenceError> {
    let updated = diesel::update(
            workflows::table.filter(workflows::id.eq(workflow_id))
                            .filter(workflows::status.ne(Status::Error.as_str())),
        )
        .set((workflows::status.eq(Status::Error.as_str()),
              workflows::end_time.eq(Some(at))))
        .execute(conn)?;
    if updated == 0 {
        debug!("mark_workflow_error:noop workflow_id={workflow_id}");
    }
    Ok(())
}
