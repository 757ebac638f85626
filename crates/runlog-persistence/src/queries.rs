//! Consultas compartidas: búsquedas por clave natural para los handlers y
//! listados de auditoría para consumidores externos (CLI, tests).

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::PersistenceError;
use crate::models::{ErrorRow, GroupRow, JobRow, RuleRow, WorkflowRow};
use crate::schema::{errors, groups, jobs, rules, workflows};

pub fn get_workflow(conn: &mut SqliteConnection, workflow_id: &str) -> Result<Option<WorkflowRow>, PersistenceError> {
    workflows::table.filter(workflows::id.eq(workflow_id))
                    .first::<WorkflowRow>(conn)
                    .optional()
                    .map_err(PersistenceError::from)
}

pub fn list_workflows(conn: &mut SqliteConnection) -> Result<Vec<WorkflowRow>, PersistenceError> {
    workflows::table.order(workflows::started_at.asc())
                    .load::<WorkflowRow>(conn)
                    .map_err(PersistenceError::from)
}

pub fn find_rule(conn: &mut SqliteConnection, workflow_id: &str, name: &str) -> Result<Option<RuleRow>, PersistenceError> {
    rules::table.filter(rules::workflow_id.eq(workflow_id))
                .filter(rules::name.eq(name))
                .first::<RuleRow>(conn)
                .optional()
                .map_err(PersistenceError::from)
}

pub fn rules_for_workflow(conn: &mut SqliteConnection, workflow_id: &str) -> Result<Vec<RuleRow>, PersistenceError> {
    rules::table.filter(rules::workflow_id.eq(workflow_id))
                .order(rules::name.asc())
                .load::<RuleRow>(conn)
                .map_err(PersistenceError::from)
}

pub fn find_job(conn: &mut SqliteConnection, workflow_id: &str, external_id: i64) -> Result<Option<JobRow>, PersistenceError> {
    jobs::table.filter(jobs::workflow_id.eq(workflow_id))
               .filter(jobs::external_id.eq(external_id))
               .first::<JobRow>(conn)
               .optional()
               .map_err(PersistenceError::from)
}

pub fn jobs_for_workflow(conn: &mut SqliteConnection, workflow_id: &str) -> Result<Vec<JobRow>, PersistenceError> {
    jobs::table.filter(jobs::workflow_id.eq(workflow_id))
               .order(jobs::external_id.asc())
               .load::<JobRow>(conn)
               .map_err(PersistenceError::from)
}

pub fn find_group(conn: &mut SqliteConnection, workflow_id: &str, external_id: i64) -> Result<Option<GroupRow>, PersistenceError> {
    groups::table.filter(groups::workflow_id.eq(workflow_id))
                 .filter(groups::external_id.eq(external_id))
                 .first::<GroupRow>(conn)
                 .optional()
                 .map_err(PersistenceError::from)
}

pub fn groups_for_workflow(conn: &mut SqliteConnection, workflow_id: &str) -> Result<Vec<GroupRow>, PersistenceError> {
    groups::table.filter(groups::workflow_id.eq(workflow_id))
                 .order(groups::external_id.asc())
                 .load::<GroupRow>(conn)
                 .map_err(PersistenceError::from)
}

pub fn errors_for_workflow(conn: &mut SqliteConnection, workflow_id: &str) -> Result<Vec<ErrorRow>, PersistenceError> {
    errors::table.filter(errors::workflow_id.eq(workflow_id))
                 .order(errors::id.asc())
                 .load::<ErrorRow>(conn)
                 .map_err(PersistenceError::from)
}
