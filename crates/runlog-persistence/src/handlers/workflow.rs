//! Handlers de alcance workflow: inicio de corrida, rulegraph y errores
//! genéricos no atados a un job.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use runlog_core::event::{ErrorEvent, EventRecord, RuleGraph, WorkflowStarted};
use runlog_core::Status;
use uuid::Uuid;

use crate::context::RunContext;
use crate::error::PersistenceError;
use crate::models::NewWorkflowRow;
use crate::schema::workflows;

use super::{insert_workflow_error, mark_workflow_error, EventHandler};

/// Crea la fila del workflow y fija su id en el contexto de corrida.
/// `started_at` es siempre el reloj local: este evento marca el inicio real
/// de la ingesta, no trae timestamp propio.
pub struct WorkflowStartedHandler;

impl EventHandler for WorkflowStartedHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = WorkflowStarted::from_record(record)?;
        let workflow_id = Uuid::new_v4();
        let id_text = workflow_id.to_string();
        let row = NewWorkflowRow { id: &id_text,
                                   source_file: event.source_file.as_deref(),
                                   started_at: Utc::now().naive_utc(),
                                   status: Status::Running.as_str(),
                                   command_line: event.command_line.as_deref(),
                                   dryrun: ctx.dryrun };
        diesel::insert_into(workflows::table).values(&row).execute(conn)?;
        ctx.current_workflow_id = Some(workflow_id);
        debug!("workflow_started:done workflow_id={workflow_id}");
        Ok(())
    }
}

/// Adjunta el snapshot del rulegraph al workflow activo. Un snapshot
/// posterior reemplaza al anterior (última escritura gana).
pub struct RuleGraphHandler;

impl EventHandler for RuleGraphHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = RuleGraph::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let payload = serde_json::to_string(&event.graph)
            .map_err(|e| PersistenceError::Unknown(format!("serialize rulegraph: {e}")))?;
        let updated = diesel::update(workflows::table.filter(workflows::id.eq(&workflow_id)))
            .set(workflows::rulegraph_data.eq(Some(payload)))
            .execute(conn)?;
        if updated == 0 {
            return Err(PersistenceError::MissingAncestor { entity: "workflow",
                                                           key: workflow_id });
        }
        debug!("rulegraph:done workflow_id={workflow_id}");
        Ok(())
    }
}

/// Persiste un error genérico de la corrida y degrada el workflow a ERROR.
pub struct ErrorHandler;

impl EventHandler for ErrorHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = ErrorEvent::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let now = Utc::now().naive_utc();
        insert_workflow_error(conn,
                              &workflow_id,
                              &event.message,
                              event.traceback.as_deref(),
                              None,
                              None,
                              now)?;
        mark_workflow_error(conn, &workflow_id, now)?;
        debug!("error:done workflow_id={workflow_id}");
        Ok(())
    }
}
