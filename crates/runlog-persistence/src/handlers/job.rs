//! Handlers de jobs: metadatos, arranque, finalización y error.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use runlog_core::event::{EventRecord, JobError, JobFinished, JobInfo, JobStarted};
use runlog_core::JobStatus;

use crate::context::RunContext;
use crate::error::PersistenceError;
use crate::models::{JobRow, NewJobRow, NewRuleRow};
use crate::queries;
use crate::schema::{jobs, rules};

use super::{insert_workflow_error, is_terminal_status, mark_workflow_error, EventHandler};

/// get-or-create de la regla por (workflow, nombre). Idempotente: todos los
/// jobs de una misma regla comparten una única fila.
pub(crate) fn get_or_create_rule(conn: &mut SqliteConnection,
                                 workflow_id: &str,
                                 name: &str)
                                 -> Result<i32, PersistenceError> {
    if let Some(rule) = queries::find_rule(conn, workflow_id, name)? {
        return Ok(rule.id);
    }
    let row = NewRuleRow { workflow_id, name };
    let id = diesel::insert_into(rules::table).values(&row)
                                              .returning(rules::id)
                                              .get_result::<i32>(conn)?;
    Ok(id)
}

/// Lleva un job a estado terminal y fija `end_time`, una sola vez. Una fila
/// ya terminal queda intacta.
pub(crate) fn finish_job(conn: &mut SqliteConnection,
                         job: &JobRow,
                         status: JobStatus,
                         at: NaiveDateTime)
                         -> Result<(), PersistenceError> {
    if is_terminal_status(&job.status) {
        debug!("finish_job:noop already terminal job_id={} status={}", job.external_id, job.status);
        return Ok(());
    }
    diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
        .set((jobs::status.eq(status.as_str()), jobs::end_time.eq(Some(at))))
        .execute(conn)?;
    Ok(())
}

/// Alta (o backfill) de los metadatos de un job: regla, comando shell,
/// recursos y membresía de grupo.
pub struct JobInfoHandler;

impl EventHandler for JobInfoHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = JobInfo::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let rule_id = get_or_create_rule(conn, &workflow_id, &event.rule_name)?;
        let resources_text = match &event.resources {
            Some(value) => Some(serde_json::to_string(value)
                .map_err(|e| PersistenceError::Unknown(format!("serialize resources: {e}")))?),
            None => None,
        };
        // La membresía sólo se materializa si el grupo ya tiene fila; si no,
        // `group_info` la completará después.
        let group_row_id = match event.group_id {
            Some(gid) => queries::find_group(conn, &workflow_id, gid)?.map(|g| g.id),
            None => None,
        };
        match queries::find_job(conn, &workflow_id, event.job_id)? {
            Some(job) => {
                diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
                    .set((jobs::rule_id.eq(Some(rule_id)),
                          jobs::shell_command.eq(event.shell_command.as_deref()),
                          jobs::resources.eq(resources_text.as_deref())))
                    .execute(conn)?;
                if let Some(gid) = group_row_id {
                    diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
                        .set(jobs::group_id.eq(Some(gid)))
                        .execute(conn)?;
                }
            }
            None => {
                let row = NewJobRow { workflow_id: &workflow_id,
                                      rule_id: Some(rule_id),
                                      group_id: group_row_id,
                                      external_id: event.job_id,
                                      status: JobStatus::Pending.as_str(),
                                      started_at: None,
                                      shell_command: event.shell_command.as_deref(),
                                      resources: resources_text.as_deref() };
                diesel::insert_into(jobs::table).values(&row).execute(conn)?;
            }
        }
        debug!("job_info:done workflow_id={workflow_id} job_id={}", event.job_id);
        Ok(())
    }
}

/// Marca en ejecución cada job del lote. Crea la fila si `job_info` no pasó
/// todavía; `started_at` se fija una sola vez.
pub struct JobStartedHandler;

impl EventHandler for JobStartedHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = JobStarted::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let started_at = event.time
                              .map(|t| t.naive_utc())
                              .unwrap_or_else(|| Utc::now().naive_utc());
        let rule_id = match &event.rule_name {
            Some(name) => Some(get_or_create_rule(conn, &workflow_id, name)?),
            None => None,
        };
        for job_id in &event.job_ids {
            match queries::find_job(conn, &workflow_id, *job_id)? {
                None => {
                    let row = NewJobRow { workflow_id: &workflow_id,
                                          rule_id,
                                          group_id: None,
                                          external_id: *job_id,
                                          status: JobStatus::Running.as_str(),
                                          started_at: Some(started_at),
                                          shell_command: None,
                                          resources: None };
                    diesel::insert_into(jobs::table).values(&row).execute(conn)?;
                }
                Some(job) if is_terminal_status(&job.status) => {
                    debug!("job_started:skip terminal workflow_id={workflow_id} job_id={job_id}");
                }
                Some(job) => {
                    diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
                        .set((jobs::status.eq(JobStatus::Running.as_str()),
                              jobs::started_at.eq(Some(job.started_at.unwrap_or(started_at)))))
                        .execute(conn)?;
                }
            }
        }
        debug!("job_started:done workflow_id={workflow_id} jobs={}", event.job_ids.len());
        Ok(())
    }
}

/// Finalización exitosa de un job ya conocido.
pub struct JobFinishedHandler;

impl EventHandler for JobFinishedHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = JobFinished::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let job = queries::find_job(conn, &workflow_id, event.job_id)?
            .ok_or_else(|| PersistenceError::MissingAncestor {
                entity: "job",
                key: format!("workflow={workflow_id} job_id={}", event.job_id),
            })?;
        let at = event.time
                      .map(|t| t.naive_utc())
                      .unwrap_or_else(|| Utc::now().naive_utc());
        finish_job(conn, &job, JobStatus::Finished, at)?;
        debug!("job_finished:done workflow_id={workflow_id} job_id={}", event.job_id);
        Ok(())
    }
}

/// Falla de un job: termina el job, agrega la fila de error y degrada el
/// workflow a ERROR dentro de la misma transacción.
pub struct JobErrorHandler;

impl EventHandler for JobErrorHandler {
    fn handle(&self,
              record: &EventRecord,
              conn: &mut SqliteConnection,
              ctx: &mut RunContext)
              -> Result<(), PersistenceError> {
        let event = JobError::from_record(record)?;
        let workflow_id = ctx.require_workflow_id()?.to_string();
        let job = queries::find_job(conn, &workflow_id, event.job_id)?
            .ok_or_else(|| PersistenceError::MissingAncestor {
                entity: "job",
                key: format!("workflow={workflow_id} job_id={}", event.job_id),
            })?;
        let at = event.time
                      .map(|t| t.naive_utc())
                      .unwrap_or_else(|| Utc::now().naive_utc());
        finish_job(conn, &job, JobStatus::Error, at)?;
        let message = event.message
                           .clone()
                           .unwrap_or_else(|| format!("job {} failed", event.job_id));
        insert_workflow_error(conn,
                              &workflow_id,
                              &message,
                              event.traceback.as_deref(),
                              Some(job.id),
                              None,
                              at)?;
        mark_workflow_error(conn, &workflow_id, at)?;
        debug!("job_error:done workflow_id={workflow_id} job_id={}", event.job_id);
        Ok(())
    }
}
