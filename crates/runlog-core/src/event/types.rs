//! Eventos tipados del ciclo de vida y sus parsers.
//!
//! Rol en el pipeline:
//! - Cada tipo declara los campos que su handler necesita y se construye con
//!   `from_record` (puro y determinista: mismo registro, mismo resultado).
//! - `RunEvent` es la unión etiquetada de todos los tipos. Un kind no
//!   reconocido produce la variante `Unrecognized`, nunca un error: la
//!   decisión de descartarlo pertenece al dispatcher.
//! - Los campos de tiempo son opcionales; quien persiste decide el fallback.
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::ParseError;

use super::kind::EventKind;
use super::record::EventRecord;

/// Inicio de un workflow. Primer evento esperado de una corrida.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStarted {
    pub source_file: Option<String>,
    pub command_line: Option<String>,
}

impl WorkflowStarted {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            source_file: record.opt_str("source_file")?,
            command_line: record.opt_str("command_line")?,
        })
    }
}

/// Metadatos de un job concreto: regla, comando shell, recursos y grupo.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub job_id: i64,
    pub rule_name: String,
    pub shell_command: Option<String>,
    pub resources: Option<Value>,
    pub group_id: Option<i64>,
    pub time: Option<DateTime<Utc>>,
}

impl JobInfo {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            job_id: record.require_i64("job_id")?,
            rule_name: record.require_str("rule_name")?,
            shell_command: record.opt_str("shell_command")?,
            resources: record.opt_json("resources"),
            group_id: record.opt_i64("group_id")?,
            time: record.opt_timestamp("time")?,
        })
    }
}

/// Arranque de uno o más jobs despachados en lote.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStarted {
    pub job_ids: Vec<i64>,
    pub rule_name: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl JobStarted {
    /// Acepta `job_ids` (lista) o, en su defecto, `job_id` escalar.
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        let job_ids = match record.opt_i64_list("job_ids")? {
            Some(ids) => ids,
            None => match record.opt_i64("job_id")? {
                Some(id) => vec![id],
                None => return Err(ParseError::MissingField { field: "job_ids" }),
            },
        };
        Ok(Self {
            job_ids,
            rule_name: record.opt_str("rule_name")?,
            time: record.opt_timestamp("time")?,
        })
    }
}

/// Finalización exitosa de un job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFinished {
    pub job_id: i64,
    pub time: Option<DateTime<Utc>>,
}

impl JobFinished {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            job_id: record.require_i64("job_id")?,
            time: record.opt_timestamp("time")?,
        })
    }
}

/// Falla de un job. Termina el job y degrada el workflow a error.
#[derive(Debug, Clone, PartialEq)]
pub struct JobError {
    pub job_id: i64,
    pub message: Option<String>,
    pub traceback: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl JobError {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            job_id: record.require_i64("job_id")?,
            message: record.opt_str("message")?,
            traceback: record.opt_str("traceback")?,
            time: record.opt_timestamp("time")?,
        })
    }
}

/// Alta de un grupo de jobs y lista de miembros conocidos.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    pub group_id: i64,
    pub job_ids: Vec<i64>,
    pub time: Option<DateTime<Utc>>,
}

impl GroupInfo {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            group_id: record.require_i64("group_id")?,
            job_ids: record.opt_i64_list("job_ids")?.unwrap_or_default(),
            time: record.opt_timestamp("time")?,
        })
    }
}

/// Falla de un grupo completo.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupError {
    pub group_id: i64,
    pub message: Option<String>,
    pub traceback: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl GroupError {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            group_id: record.require_i64("group_id")?,
            message: record.opt_str("message")?,
            traceback: record.opt_str("traceback")?,
            time: record.opt_timestamp("time")?,
        })
    }
}

/// Snapshot del grafo de reglas de la corrida, como JSON opaco.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleGraph {
    pub graph: Value,
}

impl RuleGraph {
    /// Acepta el payload bajo `rulegraph` o, en su defecto, `graph`.
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        let graph = record
            .opt_json("rulegraph")
            .or_else(|| record.opt_json("graph"))
            .ok_or(ParseError::MissingField { field: "rulegraph" })?;
        Ok(Self { graph })
    }
}

/// Error genérico de la corrida, no atado a un job ni a un grupo.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub message: String,
    pub traceback: Option<String>,
}

impl ErrorEvent {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            message: record.require_str("message")?,
            traceback: record.opt_str("traceback")?,
        })
    }
}

/// Comando shell asociado a un job (evento informativo, no persistido).
#[derive(Debug, Clone, PartialEq)]
pub struct ShellCmd {
    pub job_id: i64,
    pub shell_command: Option<String>,
    pub rule_name: Option<String>,
}

impl ShellCmd {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            job_id: record.require_i64("job_id")?,
            shell_command: record.opt_str("shell_command")?,
            rule_name: record.opt_str("rule_name")?,
        })
    }
}

/// Recursos disponibles declarados por el motor (informativo).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcesInfo {
    pub nodes: Option<Value>,
    pub cores: Option<i64>,
    pub provided_resources: Option<Value>,
}

impl ResourcesInfo {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            nodes: record.opt_json("nodes"),
            cores: record.opt_i64("cores")?,
            provided_resources: record.opt_json("provided_resources"),
        })
    }
}

/// Traza de decisión del DAG (informativo).
#[derive(Debug, Clone, PartialEq)]
pub struct DebugDag {
    pub status: Option<String>,
    pub job: Option<String>,
    pub file: Option<String>,
    pub exception: Option<String>,
}

impl DebugDag {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            status: record.opt_str("status")?,
            job: record.opt_str("job")?,
            file: record.opt_str("file")?,
            exception: record.opt_str("exception")?,
        })
    }
}

/// Avance agregado de la corrida (informativo).
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

impl Progress {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            done: record.require_u64("done")?,
            total: record.require_u64("total")?,
        })
    }
}

/// Resumen de jobs planificados por regla (informativo).
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub per_rule_job_counts: Value,
    pub total_job_count: u64,
}

impl RunInfo {
    pub fn from_record(record: &EventRecord) -> Result<Self, ParseError> {
        Ok(Self {
            per_rule_job_counts: record
                .opt_json("per_rule_job_counts")
                .ok_or(ParseError::MissingField { field: "per_rule_job_counts" })?,
            total_job_count: record.require_u64("total_job_count")?,
        })
    }
}

/// Unión etiquetada de todos los eventos tipados.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    WorkflowStarted(WorkflowStarted),
    JobInfo(JobInfo),
    JobStarted(JobStarted),
    JobFinished(JobFinished),
    JobError(JobError),
    GroupInfo(GroupInfo),
    GroupError(GroupError),
    RuleGraph(RuleGraph),
    Error(ErrorEvent),
    ShellCmd(ShellCmd),
    ResourcesInfo(ResourcesInfo),
    DebugDag(DebugDag),
    Progress(Progress),
    RunInfo(RunInfo),
    Unrecognized { label: String },
}

impl RunEvent {
    /// Parsea el registro según su kind declarado. `Ok(None)` significa que
    /// el registro no lleva campo `event` textual y no es un evento.
    pub fn from_record(record: &EventRecord) -> Result<Option<Self>, ParseError> {
        let Some(kind) = record.kind() else {
            return Ok(None);
        };
        let event = match kind {
            EventKind::WorkflowStarted => {
                RunEvent::WorkflowStarted(WorkflowStarted::from_record(record)?)
            }
            EventKind::JobInfo => RunEvent::JobInfo(JobInfo::from_record(record)?),
            EventKind::JobStarted => RunEvent::JobStarted(JobStarted::from_record(record)?),
            EventKind::JobFinished => RunEvent::JobFinished(JobFinished::from_record(record)?),
            EventKind::JobError => RunEvent::JobError(JobError::from_record(record)?),
            EventKind::GroupInfo => RunEvent::GroupInfo(GroupInfo::from_record(record)?),
            EventKind::GroupError => RunEvent::GroupError(GroupError::from_record(record)?),
            EventKind::RuleGraph => RunEvent::RuleGraph(RuleGraph::from_record(record)?),
            EventKind::Error => RunEvent::Error(ErrorEvent::from_record(record)?),
            EventKind::ShellCmd => RunEvent::ShellCmd(ShellCmd::from_record(record)?),
            EventKind::ResourcesInfo => {
                RunEvent::ResourcesInfo(ResourcesInfo::from_record(record)?)
            }
            EventKind::DebugDag => RunEvent::DebugDag(DebugDag::from_record(record)?),
            EventKind::Progress => RunEvent::Progress(Progress::from_record(record)?),
            EventKind::RunInfo => RunEvent::RunInfo(RunInfo::from_record(record)?),
            EventKind::Unrecognized(label) => RunEvent::Unrecognized { label },
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            RunEvent::WorkflowStarted(_) => EventKind::WorkflowStarted,
            RunEvent::JobInfo(_) => EventKind::JobInfo,
            RunEvent::JobStarted(_) => EventKind::JobStarted,
            RunEvent::JobFinished(_) => EventKind::JobFinished,
            RunEvent::JobError(_) => EventKind::JobError,
            RunEvent::GroupInfo(_) => EventKind::GroupInfo,
            RunEvent::GroupError(_) => EventKind::GroupError,
            RunEvent::RuleGraph(_) => EventKind::RuleGraph,
            RunEvent::Error(_) => EventKind::Error,
            RunEvent::ShellCmd(_) => EventKind::ShellCmd,
            RunEvent::ResourcesInfo(_) => EventKind::ResourcesInfo,
            RunEvent::DebugDag(_) => EventKind::DebugDag,
            RunEvent::Progress(_) => EventKind::Progress,
            RunEvent::RunInfo(_) => EventKind::RunInfo,
            RunEvent::Unrecognized { label } => EventKind::Unrecognized(label.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> EventRecord {
        EventRecord::from_value(value).expect("objeto JSON")
    }

    #[test]
    fn workflow_started_fields_are_optional() {
        let full = record(json!({
            "event": "workflow_started",
            "source_file": "pipeline.smk",
            "command_line": "run --cores 4"
        }));
        let parsed = WorkflowStarted::from_record(&full).unwrap();
        assert_eq!(parsed.source_file.as_deref(), Some("pipeline.smk"));
        assert_eq!(parsed.command_line.as_deref(), Some("run --cores 4"));

        let empty = record(json!({"event": "workflow_started"}));
        let parsed = WorkflowStarted::from_record(&empty).unwrap();
        assert_eq!(parsed.source_file, None);
        assert_eq!(parsed.command_line, None);
    }

    #[test]
    fn job_info_requires_id_and_rule() {
        let rec = record(json!({
            "event": "job_info",
            "job_id": "7",
            "rule_name": "align",
            "resources": {"mem_mb": 4000},
            "group_id": 2
        }));
        let parsed = JobInfo::from_record(&rec).unwrap();
        assert_eq!(parsed.job_id, 7);
        assert_eq!(parsed.rule_name, "align");
        assert_eq!(parsed.resources, Some(json!({"mem_mb": 4000})));
        assert_eq!(parsed.group_id, Some(2));

        let missing = record(json!({"event": "job_info", "job_id": 7}));
        assert_eq!(
            JobInfo::from_record(&missing),
            Err(ParseError::MissingField { field: "rule_name" })
        );
    }

    #[test]
    fn job_started_accepts_list_or_scalar() {
        let list = record(json!({"event": "job_started", "job_ids": [1, "2"]}));
        assert_eq!(JobStarted::from_record(&list).unwrap().job_ids, vec![1, 2]);

        let scalar = record(json!({"event": "job_started", "job_id": 9}));
        assert_eq!(JobStarted::from_record(&scalar).unwrap().job_ids, vec![9]);

        let neither = record(json!({"event": "job_started"}));
        assert_eq!(
            JobStarted::from_record(&neither),
            Err(ParseError::MissingField { field: "job_ids" })
        );
    }

    #[test]
    fn rulegraph_accepts_both_payload_fields() {
        let graph = json!({"nodes": ["a"], "links": []});
        let primary = record(json!({"event": "rulegraph", "rulegraph": graph.clone()}));
        assert_eq!(RuleGraph::from_record(&primary).unwrap().graph, graph);

        let alias = record(json!({"event": "rulegraph", "graph": graph.clone()}));
        assert_eq!(RuleGraph::from_record(&alias).unwrap().graph, graph);

        let empty = record(json!({"event": "rulegraph"}));
        assert!(RuleGraph::from_record(&empty).is_err());
    }

    #[test]
    fn error_event_requires_message() {
        let rec = record(json!({"event": "error", "message": "boom", "traceback": "tb"}));
        let parsed = ErrorEvent::from_record(&rec).unwrap();
        assert_eq!(parsed.message, "boom");
        assert_eq!(parsed.traceback.as_deref(), Some("tb"));

        let missing = record(json!({"event": "error"}));
        assert!(ErrorEvent::from_record(&missing).is_err());
    }

    #[test]
    fn run_event_dispatch_covers_every_kind() {
        let graph = json!({"nodes": []});
        let cases = vec![
            json!({"event": "workflow_started"}),
            json!({"event": "job_info", "job_id": 1, "rule_name": "r"}),
            json!({"event": "job_started", "job_ids": [1]}),
            json!({"event": "job_finished", "job_id": 1}),
            json!({"event": "job_error", "job_id": 1}),
            json!({"event": "group_info", "group_id": 1}),
            json!({"event": "group_error", "group_id": 1}),
            json!({"event": "rulegraph", "rulegraph": graph}),
            json!({"event": "error", "message": "m"}),
            json!({"event": "shellcmd", "job_id": 1}),
            json!({"event": "resources_info", "cores": 8}),
            json!({"event": "debug_dag", "status": "candidate"}),
            json!({"event": "progress", "done": 1, "total": 2}),
            json!({"event": "run_info", "per_rule_job_counts": {"r": 1}, "total_job_count": 1}),
        ];
        for case in cases {
            let rec = record(case.clone());
            let expected = rec.kind().unwrap();
            let event = RunEvent::from_record(&rec).unwrap().unwrap();
            assert_eq!(event.kind(), expected, "{case}");
        }
    }

    #[test]
    fn run_event_is_deterministic() {
        let rec = record(json!({
            "event": "job_error",
            "job_id": 3,
            "message": "fallo",
            "time": 1700000000
        }));
        assert_eq!(
            RunEvent::from_record(&rec).unwrap(),
            RunEvent::from_record(&rec).unwrap()
        );
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let rec = record(json!({"event": "checkpoint", "data": 1}));
        let event = RunEvent::from_record(&rec).unwrap().unwrap();
        assert_eq!(
            event,
            RunEvent::Unrecognized { label: "checkpoint".to_string() }
        );
    }

    #[test]
    fn recordless_input_is_not_an_event() {
        let rec = record(json!({"level": "info", "msg": "hola"}));
        assert_eq!(RunEvent::from_record(&rec).unwrap(), None);
    }
}
