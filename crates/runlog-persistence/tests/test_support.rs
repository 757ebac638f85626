// Compartido entre los archivos de tests de integración; no todos usan
// todos los helpers.
#![allow(dead_code)]

use std::path::PathBuf;

use runlog_core::EventRecord;
use runlog_persistence::models::{ErrorRow, GroupRow, JobRow, RuleRow, WorkflowRow};
use runlog_persistence::{queries, RecorderSettings, RunRecorder};
use serde_json::Value;
use tempfile::TempDir;

/// Recorder sobre una base nueva en un directorio temporal. El `TempDir`
/// debe mantenerse vivo mientras se use el recorder.
pub fn temp_recorder() -> (TempDir, RunRecorder) {
    let dir = TempDir::new().expect("tempdir");
    let db_path: PathBuf = dir.path().join("runlog.db");
    let recorder = RunRecorder::new(RecorderSettings { db_path: Some(db_path),
                                                       dryrun: false }).expect("recorder");
    (dir, recorder)
}

pub fn record(value: Value) -> EventRecord {
    EventRecord::from_value(value).expect("registro JSON")
}

pub fn send(recorder: &mut RunRecorder, value: Value) {
    recorder.on_event(&record(value));
}

/// Manda `workflow_started` y devuelve el id asignado (como texto).
pub fn start_workflow(recorder: &mut RunRecorder) -> String {
    send(recorder, serde_json::json!({
        "event": "workflow_started",
        "source_file": "pipeline.smk",
        "command_line": "run --cores 2"
    }));
    recorder.context()
            .current_workflow_id
            .expect("workflow activo")
            .to_string()
}

// Lecturas con conexión acotada: el pool es de una sola conexión, así que
// ningún helper debe retenerla más allá de la consulta.

pub fn workflow_row(recorder: &RunRecorder, id: &str) -> WorkflowRow {
    let mut conn = recorder.database().session().expect("conexión");
    queries::get_workflow(&mut conn, id).expect("query").expect("fila workflow")
}

pub fn workflow_count(recorder: &RunRecorder) -> usize {
    let mut conn = recorder.database().session().expect("conexión");
    queries::list_workflows(&mut conn).expect("query").len()
}

pub fn rules_of(recorder: &RunRecorder, id: &str) -> Vec<RuleRow> {
    let mut conn = recorder.database().session().expect("conexión");
    queries::rules_for_workflow(&mut conn, id).expect("query")
}

pub fn jobs_of(recorder: &RunRecorder, id: &str) -> Vec<JobRow> {
    let mut conn = recorder.database().session().expect("conexión");
    queries::jobs_for_workflow(&mut conn, id).expect("query")
}

pub fn job_of(recorder: &RunRecorder, id: &str, external_id: i64) -> JobRow {
    let mut conn = recorder.database().session().expect("conexión");
    queries::find_job(&mut conn, id, external_id).expect("query").expect("fila job")
}

pub fn groups_of(recorder: &RunRecorder, id: &str) -> Vec<GroupRow> {
    let mut conn = recorder.database().session().expect("conexión");
    queries::groups_for_workflow(&mut conn, id).expect("query")
}

pub fn errors_of(recorder: &RunRecorder, id: &str) -> Vec<ErrorRow> {
    let mut conn = recorder.database().session().expect("conexión");
    queries::errors_for_workflow(&mut conn, id).expect("query")
}
