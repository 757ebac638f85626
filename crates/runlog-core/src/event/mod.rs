//! Modelo de eventos: kinds, registro crudo y eventos tipados.
mod kind;
mod record;
mod types;

pub use kind::EventKind;
pub use record::EventRecord;
pub use types::{
    DebugDag, ErrorEvent, GroupError, GroupInfo, JobError, JobFinished, JobInfo, JobStarted,
    Progress, ResourcesInfo, RuleGraph, RunEvent, RunInfo, ShellCmd, WorkflowStarted,
};
