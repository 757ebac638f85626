//! Ciclo de vida completo del workflow.
//!
//! Verifica:
//! - Alta en RUNNING al recibir `workflow_started` y metadatos persistidos.
//! - `close()` reconcilia a SUCCESS con `end_time`, sólo si no hubo error.
//! - Un workflow ya degradado a ERROR no se pisa en el cierre.
//! - `close()` sin workflow previo es un no-op sin fallas.

mod test_support;

use runlog_persistence::{RecorderSettings, RunRecorder};
use serde_json::json;
use test_support::{errors_of, send, start_workflow, temp_recorder, workflow_count, workflow_row};

#[test]
fn successful_run_closes_in_success() {
    let (_dir, mut recorder) = temp_recorder();
    let workflow_id = start_workflow(&mut recorder);

    let row = workflow_row(&recorder, &workflow_id);
    assert_eq!(row.status, "RUNNING");
    assert_eq!(row.source_file.as_deref(), Some("pipeline.smk"));
    assert_eq!(row.command_line.as_deref(), Some("run --cores 2"));
    assert!(!row.dryrun);
    assert!(row.end_time.is_none());

    recorder.close();

    let row = workflow_row(&recorder, &workflow_id);
    assert_eq!(row.status, "SUCCESS");
    assert!(row.end_time.is_some(), "close debe fijar end_time");
    assert!(row.end_time.unwrap() >= row.started_at);
    assert_eq!(recorder.failure_count(), 0);
}

#[test]
fn dryrun_flag_is_persisted() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let mut recorder = RunRecorder::new(RecorderSettings {
        db_path: Some(dir.path().join("runlog.db")),
        dryrun: true,
    }).expect("recorder");
    let workflow_id = start_workflow(&mut recorder);
    assert!(workflow_row(&recorder, &workflow_id).dryrun);
}

#[test]
fn error_status_survives_close() {
    let (_dir, mut recorder) = temp_recorder();
    let workflow_id = start_workflow(&mut recorder);
    send(&mut recorder, json!({
        "event": "error",
        "message": "fallo general",
        "traceback": "Traceback ..."
    }));

    let row = workflow_row(&recorder, &workflow_id);
    assert_eq!(row.status, "ERROR");
    let error_end_time = row.end_time.expect("end_time del error");

    recorder.close();

    // El estado terminal y su end_time quedan como los dejó el error.
    let row = workflow_row(&recorder, &workflow_id);
    assert_eq!(row.status, "ERROR");
    assert_eq!(row.end_time, Some(error_end_time));

    let errors = errors_of(&recorder, &workflow_id);
    assert_eq!(errors.len(), 1, "debe haber exactamente una fila de error");
    assert_eq!(errors[0].message, "fallo general");
    assert_eq!(errors[0].traceback.as_deref(), Some("Traceback ..."));
    assert_eq!(errors[0].job_id, None);
    assert_eq!(errors[0].group_id, None);
}

#[test]
fn close_without_workflow_is_a_noop() {
    let (_dir, mut recorder) = temp_recorder();
    recorder.close();
    assert_eq!(recorder.failure_count(), 0);
    assert_eq!(recorder.context().current_workflow_id, None);
}

#[test]
fn duplicate_workflow_started_creates_a_fresh_row() {
    let (_dir, mut recorder) = temp_recorder();
    let first = start_workflow(&mut recorder);
    let second = start_workflow(&mut recorder);

    assert_ne!(first, second);
    assert_eq!(workflow_count(&recorder), 2);
    // El contexto apunta a la corrida más reciente; close() sólo la toca a
    // ella.
    recorder.close();
    assert_eq!(workflow_row(&recorder, &second).status, "SUCCESS");
    assert_eq!(workflow_row(&recorder, &first).status, "RUNNING");
}
