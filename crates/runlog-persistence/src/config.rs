//! Carga de configuración de la base desde variables de entorno.
//! Usa convención `RUNLOG_DB_PATH`; si no está definida, la base vive en
//! `.runlog/log/runlog.db` bajo el directorio de trabajo del proceso.

use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use dotenvy::dotenv;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_DB_DIR: &str = ".runlog/log";
pub const DEFAULT_DB_FILE: &str = "runlog.db";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let path = env::var("RUNLOG_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());
        Self { path }
    }
}

/// Ruta por defecto: `<cwd>/.runlog/log/runlog.db`.
pub fn default_db_path() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DEFAULT_DB_DIR)
        .join(DEFAULT_DB_FILE)
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() { Lazy::force(&DOTENV_LOADED); }
