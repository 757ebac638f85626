//! Handlers de grupos de jobs.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use runlog_core::event::{EventRecord, GroupError, GroupInfo};
use runlog_core::JobStatus;

use crate::context::RunContext;
use crate::error::PersistenceError;
use crate::models::NewGroupRow;
use crate::queries;
use crate::schema::{groups, jobs};

use super::{insert_workflow_error, is_terminal_status, mark_workflow_error, EventHandler};

/// Alta del grupo por (workflow, id externo) y enlace de los jobs listados
/// que ya tienen fila. Los ids desconocidos se omiten con una traza.
pub struct GroupInfoHandler;

impl EventHandler for GroupInfoHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = GroupInfo::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let started_at = event.time
                              .map(|t| t.naive_utc())
                              .unwrap_or_else(|| Utc::now().naive_utc());
        let group = match queries::find_group(conn, &workflow_id, event.group_id)? {
            Some(group) => group,
            None => {
                let row = NewGroupRow { workflow_id: &workflow_id,
                                        external_id: event.group_id,
                                        status: JobStatus::Running.as_str(),
                                        started_at: Some(started_at) };
                diesel::insert_into(groups::table).values(&row)
                                                  .returning(groups::all_columns)
                                                  .get_result(conn)?
            }
        };
        for job_id in &event.job_ids {
            match queries::find_job(conn, &workflow_id, *job_id)? {
                Some(job) => {
                    diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
                        .set(jobs::group_id.eq(Some(group.id)))
                        .execute(conn)?;
                }
                None => {
                    debug!("group_info:skip unknown job workflow_id={workflow_id} job_id={job_id}");
                }
            }
        }
        debug!("group_info:done workflow_id={workflow_id} group_id={}", event.group_id);
        Ok(())
    }
}

/// Falla de un grupo completo: termina el grupo, agrega la fila de error y
/// degrada el workflow a ERROR en la misma transacción.
pub struct GroupErrorHandler;

impl EventHandler for GroupErrorHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = GroupError::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let group = queries::find_group(conn, &workflow_id, event.group_id)?
            .ok_or_else(|| PersistenceError::MissingAncestor {
                entity: "group",
                key: format!("workflow={workflow_id} group_id={}", event.group_id),
            })?;
        let at = event.time
                      .map(|t| t.naive_utc())
                      .unwrap_or_else(|| Utc::now().naive_utc());
        if !is_terminal_status(&group.status) {
            diesel::update(groups::table.filter(groups::id.eq(group.id)))
                .set((groups::status.eq(JobStatus::Error.as_str()),
                      groups::end_time.eq(Some(at))))
                .execute(conn)?;
        }
        let message = event.message
                           .clone()
                           .unwrap_or_else(|| format!("group {} failed", event.group_id));
        insert_workflow_error(conn,
                              &workflow_id,
                              &message,
                              event.traceback.as_deref(),
                              None,
                              Some(group.id),
                              at)?;
        mark_workflow_error(conn, &workflow_id, at)?;
        debug!("group_error:done workflow_id={workflow_id} group_id={}", event.group_id);
        Ok(())
    }
}
