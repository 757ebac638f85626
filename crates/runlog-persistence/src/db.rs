//! Gestión de conexiones SQLite (Diesel + r2d2) y sesiones con alcance.
//!
//! Objetivo general del módulo:
//! - Poseer el pool de conexiones durante toda la vida del proceso de
//!   ingesta.
//! - Crear el esquema de forma idempotente (DDL `IF NOT EXISTS`), sin
//!   tooling de migraciones.
//! - Entregar sesiones de alcance acotado: una transacción por unidad de
//!   trabajo, commit si el cierre devuelve `Ok`, rollback si devuelve `Err`,
//!   y la conexión vuelve al pool en ambos casos.
//!
//! Notas operativas:
//! - Cada conexión del pool se inicializa con `foreign_keys = ON` (las
//!   cascadas del esquema dependen de esto) y `busy_timeout` para la
//!   contención puntual de otro proceso sobre el mismo archivo.
//! - La base en memoria fija el pool en una única conexión: SQLite crea una
//!   base vacía nueva por cada conexión `:memory:`.

use std::fs;
use std::path::{Path, PathBuf};

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use log::debug;

use crate::config::StoreConfig;
use crate::error::PersistenceError;

/// Alias de tipo para el pool r2d2 de conexiones SQLite.
pub type SqlitePool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type PooledSqliteConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

// Pragmas aplicados a cada conexión al salir del pool.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
            .map_err(r2d2::Error::QueryError)
    }
}

// DDL idempotente del esquema completo, en orden de referencias
// (workflows -> rules/groups -> jobs -> errors).
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS workflows (
    id TEXT PRIMARY KEY NOT NULL,
    source_file TEXT,
    started_at TIMESTAMP NOT NULL,
    end_time TIMESTAMP,
    status TEXT NOT NULL DEFAULT 'UNKNOWN'
        CHECK (status IN ('UNKNOWN', 'RUNNING', 'SUCCESS', 'ERROR')),
    command_line TEXT,
    dryrun BOOLEAN NOT NULL DEFAULT 0,
    rulegraph_data TEXT
);
CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    workflow_id TEXT NOT NULL REFERENCES workflows (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE (workflow_id, name)
);
CREATE TABLE IF NOT EXISTS groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    workflow_id TEXT NOT NULL REFERENCES workflows (id) ON DELETE CASCADE,
    external_id BIGINT NOT NULL,
    status TEXT NOT NULL DEFAULT 'running',
    started_at TIMESTAMP,
    end_time TIMESTAMP,
    UNIQUE (workflow_id, external_id)
);
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    workflow_id TEXT NOT NULL REFERENCES workflows (id) ON DELETE CASCADE,
    rule_id INTEGER REFERENCES rules (id),
    group_id INTEGER REFERENCES groups (id),
    external_id BIGINT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    started_at TIMESTAMP,
    end_time TIMESTAMP,
    shell_command TEXT,
    resources TEXT,
    UNIQUE (workflow_id, external_id)
);
CREATE TABLE IF NOT EXISTS errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    workflow_id TEXT NOT NULL REFERENCES workflows (id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    traceback TEXT,
    job_id INTEGER REFERENCES jobs (id),
    group_id INTEGER REFERENCES groups (id),
    created_at TIMESTAMP NOT NULL
);
";

/// Dueño del pool y del ciclo de vida del esquema.
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Abre (o crea) la base en `path`. Con `None` resuelve la ruta desde el
    /// entorno (`RUNLOG_DB_PATH`) o la ubicación por defecto bajo el
    /// directorio de trabajo, creando los directorios intermedios.
    pub fn open(path: Option<&Path>) -> Result<Self, PersistenceError> {
        let path: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => StoreConfig::from_env().path,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    PersistenceError::TransientIo(format!(
                        "create db dir {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let database_url = path.to_string_lossy().into_owned();
        let pool = build_pool(&database_url, 1)?;
        debug!("open:done path={}", path.display());
        Ok(Self { pool })
    }

    /// Base efímera en memoria, para tests y corridas descartables.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let pool = build_pool(":memory:", 1)?;
        Ok(Self { pool })
    }

    /// Crea las tablas si no existen. Seguro de llamar más de una vez.
    pub fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let mut conn = self.session()?;
        conn.batch_execute(SCHEMA_DDL)?;
        debug!("initialize_schema:done");
        Ok(())
    }

    /// Conexión cruda del pool, sin transacción. Para lecturas.
    pub fn session(&self) -> Result<PooledSqliteConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }

    /// Alcance de sesión: adquiere una conexión, ejecuta `f` dentro de una
    /// transacción inmediata y la resuelve según el resultado (commit con
    /// `Ok`, rollback con `Err`).
    pub fn session_scope<T, F>(&self, f: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut SqliteConnection) -> Result<T, PersistenceError>
    {
        let mut conn = self.session()?;
        conn.immediate_transaction(f)
    }
}

/// Construye el pool r2d2 sobre `database_url` (ruta de archivo o
/// `:memory:`). `max_size = 0` se ajusta a 1.
pub fn build_pool(database_url: &str, max_size: u32) -> Result<SqlitePool, PersistenceError> {
    let validated_max = if max_size == 0 { 1 } else { max_size };
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(validated_max)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use diesel::prelude::*;

    use crate::models::{NewJobRow, NewWorkflowRow};
    use crate::schema::{jobs, workflows};

    fn seeded() -> DatabaseManager {
        let db = DatabaseManager::in_memory().expect("base en memoria");
        db.initialize_schema().expect("esquema");
        db
    }

    fn insert_workflow(conn: &mut SqliteConnection, id: &str) -> Result<(), PersistenceError> {
        let row = NewWorkflowRow { id,
                                   source_file: None,
                                   started_at: Utc::now().naive_utc(),
                                   status: "RUNNING",
                                   command_line: None,
                                   dryrun: false };
        diesel::insert_into(workflows::table).values(&row).execute(conn)?;
        Ok(())
    }

    fn workflow_count(db: &DatabaseManager) -> i64 {
        let mut conn = db.session().expect("conexión");
        workflows::table.count().get_result(&mut conn).expect("count")
    }

    #[test]
    fn initialize_schema_is_idempotent() {
        let db = seeded();
        db.initialize_schema().expect("segunda pasada");
        assert_eq!(workflow_count(&db), 0);
    }

    #[test]
    fn session_scope_commits_on_ok() {
        let db = seeded();
        db.session_scope(|conn| insert_workflow(conn, "wf-1")).expect("commit");
        assert_eq!(workflow_count(&db), 1);
    }

    #[test]
    fn session_scope_rolls_back_on_err() {
        let db = seeded();
        let result: Result<(), PersistenceError> = db.session_scope(|conn| {
            insert_workflow(conn, "wf-1")?;
            Err(PersistenceError::Unknown("abortar".into()))
        });
        assert!(result.is_err());
        assert_eq!(workflow_count(&db), 0);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = seeded();
        let result = db.session_scope(|conn| {
            let row = NewJobRow { workflow_id: "inexistente",
                                  rule_id: None,
                                  group_id: None,
                                  external_id: 1,
                                  status: "pending",
                                  started_at: None,
                                  shell_command: None,
                                  resources: None };
            diesel::insert_into(jobs::table).values(&row).execute(conn)?;
            Ok(())
        });
        assert!(matches!(result, Err(PersistenceError::ForeignKeyViolation(_))));
    }

    #[test]
    fn status_check_constraint_rejects_unknown_values() {
        let db = seeded();
        let result = db.session_scope(|conn| {
            let row = NewWorkflowRow { id: "wf-1",
                                       source_file: None,
                                       started_at: Utc::now().naive_utc(),
                                       status: "EN_CURSO",
                                       command_line: None,
                                       dryrun: false };
            diesel::insert_into(workflows::table).values(&row).execute(conn)?;
            Ok(())
        });
        assert!(matches!(result, Err(PersistenceError::CheckViolation(_))));
    }
}
