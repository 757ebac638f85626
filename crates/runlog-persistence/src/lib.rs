//! runlog-persistence: capa SQLite (Diesel) del pipeline de eventos.
//!
//! Responsabilidades:
//! - Esquema relacional y filas mapeadas (`schema`, `models`).
//! - Pool de conexiones, DDL idempotente y sesiones con alcance
//!   transaccional (`db`).
//! - Un handler de persistencia por kind de evento (`handlers`).
//! - El dispatcher `RunRecorder`: una transacción por evento, canal interno
//!   de fallas y reconciliación de cierre (`recorder`).
//! - Consultas de auditoría para CLI y tests (`queries`).
//!
//! Garantías:
//! - Un evento malformado o huérfano nunca corta la ingesta: su transacción
//!   se revierte y la falla queda observable.
//! - Estados terminales (workflow, job, grupo) no se sobreescriben.
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod queries;
pub mod recorder;
pub mod schema;

pub use config::{default_db_path, init_dotenv, StoreConfig};
pub use context::RunContext;
pub use db::{build_pool, DatabaseManager, PooledSqliteConnection, SqlitePool};
pub use error::PersistenceError;
pub use recorder::{InternalFailure, RecorderSettings, RunRecorder};
