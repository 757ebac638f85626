//! Estados de workflow y de job, persistidos como texto.
//!
//! Rol en el pipeline:
//! - `Status` es el estado agregado de un workflow completo; arranca en
//!   `Running` al crear la fila y sólo `Success`/`Error` son terminales.
//! - `JobStatus` cubre jobs individuales y grupos de jobs.
//! - Las representaciones textuales son el contrato con la base: un estado
//!   terminal nunca se sobreescribe una vez grabado.
use serde::{Deserialize, Serialize};

/// Estado agregado de un workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Unknown,
    Running,
    Success,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "UNKNOWN",
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Error => "ERROR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Some(Status::Unknown),
            "RUNNING" => Some(Status::Running),
            "SUCCESS" => Some(Status::Success),
            "ERROR" => Some(Status::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Error)
    }
}

/// Estado de un job individual o de un grupo de jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "finished" => Some(JobStatus::Finished),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip_and_terminal() {
        for status in [Status::Unknown, Status::Running, Status::Success, Status::Error] {
            assert_eq!(Status::from_str(status.as_str()), Some(status));
        }
        assert!(Status::Error.is_terminal());
        assert!(Status::Success.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert_eq!(Status::from_str(" success "), Some(Status::Success));
        assert_eq!(Status::from_str("otro"), None);
    }

    #[test]
    fn job_status_round_trip_and_terminal() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Finished,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert_eq!(JobStatus::from_str("FINISHED"), Some(JobStatus::Finished));
    }
}
