//! Discriminador de tipo de evento.
//!
//! Las etiquetas textuales (minúsculas, `snake_case`) son el contrato estable
//! con el motor huésped. Una etiqueta no listada se conserva en
//! `Unrecognized`: clasificar nunca falla.
use serde::{Deserialize, Serialize};

/// Identifica qué ocurrencia del ciclo de vida representa un registro crudo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    WorkflowStarted,
    JobInfo,
    JobStarted,
    JobFinished,
    JobError,
    GroupInfo,
    GroupError,
    RuleGraph,
    Error,
    ShellCmd,
    ResourcesInfo,
    DebugDag,
    Progress,
    RunInfo,
    /// Etiqueta desconocida, conservada tal como llegó (normalizada a
    /// minúsculas).
    Unrecognized(String),
}

impl EventKind {
    /// Clasifica una etiqueta cruda. Insensible a mayúsculas.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "workflow_started" => EventKind::WorkflowStarted,
            "job_info" => EventKind::JobInfo,
            "job_started" => EventKind::JobStarted,
            "job_finished" => EventKind::JobFinished,
            "job_error" => EventKind::JobError,
            "group_info" => EventKind::GroupInfo,
            "group_error" => EventKind::GroupError,
            "rulegraph" => EventKind::RuleGraph,
            "error" => EventKind::Error,
            "shellcmd" => EventKind::ShellCmd,
            "resources_info" => EventKind::ResourcesInfo,
            "debug_dag" => EventKind::DebugDag,
            "progress" => EventKind::Progress,
            "run_info" => EventKind::RunInfo,
            other => EventKind::Unrecognized(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            EventKind::WorkflowStarted => "workflow_started",
            EventKind::JobInfo => "job_info",
            EventKind::JobStarted => "job_started",
            EventKind::JobFinished => "job_finished",
            EventKind::JobError => "job_error",
            EventKind::GroupInfo => "group_info",
            EventKind::GroupError => "group_error",
            EventKind::RuleGraph => "rulegraph",
            EventKind::Error => "error",
            EventKind::ShellCmd => "shellcmd",
            EventKind::ResourcesInfo => "resources_info",
            EventKind::DebugDag => "debug_dag",
            EventKind::Progress => "progress",
            EventKind::RunInfo => "run_info",
            EventKind::Unrecognized(label) => label,
        }
    }
}
