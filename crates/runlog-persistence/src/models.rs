//! Filas mapeadas (lectura) y estructuras de inserción.
//!
//! Convenciones de mapeo:
//! - Los UUID viajan como TEXT (el backend SQLite no tiene tipo nativo); la
//!   conversión a `uuid::Uuid` vive en los bordes (handlers / consumidores).
//! - Los payloads JSON (`rulegraph_data`, `resources`) también viajan como
//!   TEXT serializado.
//! - Timestamps en `NaiveDateTime`: siempre UTC, la zona se descarta al
//!   persistir.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{errors, groups, jobs, rules, workflows};

/// Fila de `workflows`: una corrida completa del motor.
#[derive(Queryable, Debug, Clone, Serialize)]
pub struct WorkflowRow {
    pub id: String,
    pub source_file: Option<String>,
    pub started_at: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub status: String,
    pub command_line: Option<String>,
    pub dryrun: bool,
    pub rulegraph_data: Option<String>,
}

/// Inserción en `workflows`. `end_time` y `rulegraph_data` nacen NULL.
#[derive(Insertable, Debug)]
#[diesel(table_name = workflows)]
pub struct NewWorkflowRow<'a> {
    pub id: &'a str,
    pub source_file: Option<&'a str>,
    pub started_at: NaiveDateTime,
    pub status: &'a str,
    pub command_line: Option<&'a str>,
    pub dryrun: bool,
}

/// Fila de `rules`: regla única por (workflow, nombre).
#[derive(Queryable, Debug, Clone, Serialize)]
pub struct RuleRow {
    pub id: i32,
    pub workflow_id: String,
    pub name: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = rules)]
pub struct NewRuleRow<'a> {
    pub workflow_id: &'a str,
    pub name: &'a str,
}

/// Fila de `groups`: grupo único por (workflow, id externo del motor).
#[derive(Queryable, Debug, Clone, Serialize)]
pub struct GroupRow {
    pub id: i32,
    pub workflow_id: String,
    pub external_id: i64,
    pub status: String,
    pub started_at: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = groups)]
pub struct NewGroupRow<'a> {
    pub workflow_id: &'a str,
    pub external_id: i64,
    pub status: &'a str,
    pub started_at: Option<NaiveDateTime>,
}

/// Fila de `jobs`: job único por (workflow, id externo del motor).
/// `rule_id` y `group_id` son opcionales: pueden llegar a conocerse después
/// de creada la fila (backfill de `job_info` / `group_info`).
#[derive(Queryable, Debug, Clone, Serialize)]
pub struct JobRow {
    pub id: i32,
    pub workflow_id: String,
    pub rule_id: Option<i32>,
    pub group_id: Option<i32>,
    pub external_id: i64,
    pub status: String,
    pub started_at: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub shell_command: Option<String>,
    pub resources: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = jobs)]
pub struct NewJobRow<'a> {
    pub workflow_id: &'a str,
    pub rule_id: Option<i32>,
    pub group_id: Option<i32>,
    pub external_id: i64,
    pub status: &'a str,
    pub started_at: Option<NaiveDateTime>,
    pub shell_command: Option<&'a str>,
    pub resources: Option<&'a str>,
}

/// Fila de `errors`: registro append-only, nunca se actualiza ni borra.
#[derive(Queryable, Debug, Clone, Serialize)]
pub struct ErrorRow {
    pub id: i32,
    pub workflow_id: String,
    pub message: String,
    pub traceback: Option<String>,
    pub job_id: Option<i32>,
    pub group_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = errors)]
pub struct NewErrorRow<'a> {
    pub workflow_id: &'a str,
    pub message: &'a str,
    pub traceback: Option<&'a str>,
    pub job_id: Option<i32>,
    pub group_id: Option<i32>,
    pub created_at: NaiveDateTime,
}
