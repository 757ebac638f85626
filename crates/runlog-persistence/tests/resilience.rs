//! Resiliencia del dispatcher ante entradas hostiles.
//!
//! Verifica:
//! - Kinds desconocidos y registros sin campo `event` se descartan en
//!   silencio (sin fallas y sin filas).
//! - Un evento malformado revierte su transacción completa y queda
//!   reportado, sin cortar la corrida.
//! - Eventos huérfanos (sin `workflow_started` previo, o contra jobs
//!   inexistentes) se reportan como ancestro ausente.
//! - Las fallas llevan el kind que las produjo.

mod test_support;

use runlog_core::EventKind;
use serde_json::json;
use test_support::{job_of, jobs_of, record, rules_of, send, start_workflow, temp_recorder,
                   workflow_count, workflow_row};

#[test]
fn unknown_kinds_are_dropped_silently() {
    let (_dir, mut recorder) = temp_recorder();
    let workflow_id = start_workflow(&mut recorder);
    send(&mut recorder, json!({"event": "checkpoint_hit", "data": {"x": 1}}));
    send(&mut recorder, json!({"event": "progress", "done": 1, "total": 9}));
    send(&mut recorder, json!({"event": "shellcmd", "job_id": 1, "shell_command": "echo"}));

    assert_eq!(recorder.failure_count(), 0);
    assert!(jobs_of(&recorder, &workflow_id).is_empty());
    assert_eq!(workflow_count(&recorder), 1);
}

#[test]
fn records_without_event_field_are_ignored() {
    let (_dir, mut recorder) = temp_recorder();
    send(&mut recorder, json!({"level": "info", "msg": "arrancando"}));
    send(&mut recorder, json!({"event": 42}));

    assert_eq!(recorder.failure_count(), 0);
    assert_eq!(workflow_count(&recorder), 0);
}

#[test]
fn malformed_event_rolls_back_and_reports() {
    let (_dir, mut recorder) = temp_recorder();
    let workflow_id = start_workflow(&mut recorder);
    // Sin rule_name: el parser falla después de que el dispatcher ya abrió
    // la transacción; no debe quedar ni el job ni regla alguna.
    send(&mut recorder, json!({"event": "job_info", "job_id": 1}));

    assert_eq!(recorder.failure_count(), 1);
    assert!(jobs_of(&recorder, &workflow_id).is_empty());
    assert!(rules_of(&recorder, &workflow_id).is_empty());

    // La corrida sigue viva.
    send(&mut recorder, json!({"event": "job_info", "job_id": 1, "rule_name": "align"}));
    assert_eq!(jobs_of(&recorder, &workflow_id).len(), 1);
}

#[test]
fn events_before_workflow_started_are_reported() {
    let (_dir, mut recorder) = temp_recorder();
    send(&mut recorder, json!({"event": "job_info", "job_id": 1, "rule_name": "align"}));
    assert_eq!(recorder.failure_count(), 1);
    assert_eq!(workflow_count(&recorder), 0);
}

#[test]
fn job_finished_for_unknown_job_is_reported_and_run_continues() {
    let (_dir, mut recorder) = temp_recorder();
    let workflow_id = start_workflow(&mut recorder);
    send(&mut recorder, json!({"event": "job_finished", "job_id": 9}));
    assert_eq!(recorder.failure_count(), 1);

    send(&mut recorder, json!({"event": "job_started", "job_ids": [9]}));
    send(&mut recorder, json!({"event": "job_finished", "job_id": 9}));
    assert_eq!(job_of(&recorder, &workflow_id, 9).status, "finished");
    assert_eq!(recorder.failure_count(), 1, "la segunda pasada no suma fallas");

    recorder.close();
    assert_eq!(workflow_row(&recorder, &workflow_id).status, "SUCCESS",
               "una falla interna no degrada el workflow");
}

#[test]
fn failures_carry_the_offending_kind() {
    let (_dir, mut recorder) = temp_recorder();
    send(&mut recorder, json!({"event": "job_error", "job_id": 1}));

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, "event handling failed");
    assert_eq!(failures[0].kind, Some(EventKind::JobError));
    assert!(!failures[0].message.is_empty());
}

#[test]
fn bad_field_types_do_not_panic() {
    let (_dir, mut recorder) = temp_recorder();
    start_workflow(&mut recorder);
    let hostile = [
        json!({"event": "job_info", "job_id": "doce", "rule_name": "a"}),
        json!({"event": "job_started", "job_ids": "1,2,3"}),
        json!({"event": "job_finished", "job_id": 1, "time": "ayer"}),
        json!({"event": "rulegraph"}),
        json!({"event": "error"}),
    ];
    for value in hostile {
        send(&mut recorder, value);
    }
    assert_eq!(recorder.failure_count(), 5);

    // Después del bombardeo la corrida sigue funcionando.
    recorder.on_event(&record(json!({"event": "job_started", "job_ids": [1]})));
    assert_eq!(recorder.failure_count(), 5);
}
