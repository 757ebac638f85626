use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use runlog_core::EventRecord;
use runlog_persistence::{queries, DatabaseManager, RecorderSettings, RunRecorder};
use uuid::Uuid;

fn main() {
    // Cargar .env si existe para obtener RUNLOG_DB_PATH; el log del pipeline
    // se controla con RUST_LOG.
    let _ = dotenvy::dotenv();
    let _ = env_logger::try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        std::process::exit(2);
    }
    match args[1].as_str() {
        "ingest" => run_ingest(&args[2..]),
        "show" => run_show(&args[2..]),
        _ => {
            usage();
            std::process::exit(2);
        }
    }
}

fn usage() {
    eprintln!("Uso: runlog-cli ingest [--input <archivo.jsonl>] [--db <ruta>] [--dryrun]");
    eprintln!("     runlog-cli show [--db <ruta>] [--workflow <UUID>]");
}

/// Lee registros JSON (uno por línea, de archivo o stdin), los pasa por el
/// recorder y cierra la corrida al agotar la entrada.
fn run_ingest(args: &[String]) {
    let mut input: Option<PathBuf> = None;
    let mut db: Option<PathBuf> = None;
    let mut dryrun = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                if i < args.len() { input = Some(PathBuf::from(&args[i])); }
            }
            "--db" => {
                i += 1;
                if i < args.len() { db = Some(PathBuf::from(&args[i])); }
            }
            "--dryrun" => { dryrun = true; }
            other => {
                eprintln!("[runlog ingest] argumento desconocido: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let mut recorder = match RunRecorder::new(RecorderSettings { db_path: db, dryrun }) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[runlog ingest] error abriendo la base: {e}");
            std::process::exit(5);
        }
    };

    let reader: Box<dyn BufRead> = match &input {
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                eprintln!("[runlog ingest] no se pudo abrir {}: {e}", path.display());
                std::process::exit(4);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut processed = 0u64;
    let mut skipped = 0u64;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[runlog ingest] error de lectura: {e}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                skipped += 1;
                eprintln!("[runlog ingest] línea ignorada (JSON inválido): {e}");
                continue;
            }
        };
        let record = match EventRecord::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                eprintln!("[runlog ingest] línea ignorada: {e}");
                continue;
            }
        };
        recorder.on_event(&record);
        processed += 1;
    }
    recorder.close();
    eprintln!("[runlog ingest] procesados={processed} ignorados={skipped} fallas={}",
              recorder.failure_count());
    if recorder.failure_count() > 0 {
        std::process::exit(3);
    }
}

/// Lista workflows o imprime el detalle de uno (reglas, jobs, grupos y
/// errores) como JSON.
fn run_show(args: &[String]) {
    let mut db: Option<PathBuf> = None;
    let mut workflow: Option<Uuid> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                i += 1;
                if i < args.len() { db = Some(PathBuf::from(&args[i])); }
            }
            "--workflow" => {
                i += 1;
                if i < args.len() { workflow = Uuid::parse_str(&args[i]).ok(); }
            }
            other => {
                eprintln!("[runlog show] argumento desconocido: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let manager = match DatabaseManager::open(db.as_deref()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("[runlog show] error abriendo la base: {e}");
            std::process::exit(5);
        }
    };
    if let Err(e) = manager.initialize_schema() {
        eprintln!("[runlog show] error inicializando esquema: {e}");
        std::process::exit(5);
    }
    let mut conn = match manager.session() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[runlog show] error de conexión: {e}");
            std::process::exit(5);
        }
    };

    match workflow {
        None => {
            let rows = match queries::list_workflows(&mut conn) {
                Ok(rows) => rows,
                Err(e) => {
                    eprintln!("[runlog show] error de consulta: {e}");
                    std::process::exit(5);
                }
            };
            print_json(&serde_json::json!({ "workflows": rows }));
        }
        Some(id) => {
            let id_text = id.to_string();
            let detail = queries::get_workflow(&mut conn, &id_text).and_then(|found| {
                let Some(workflow) = found else {
                    return Ok(None);
                };
                let rules = queries::rules_for_workflow(&mut conn, &id_text)?;
                let jobs = queries::jobs_for_workflow(&mut conn, &id_text)?;
                let groups = queries::groups_for_workflow(&mut conn, &id_text)?;
                let errors = queries::errors_for_workflow(&mut conn, &id_text)?;
                Ok(Some(serde_json::json!({
                    "workflow": workflow,
                    "rules": rules,
                    "jobs": jobs,
                    "groups": groups,
                    "errors": errors,
                })))
            });
            match detail {
                Ok(Some(value)) => print_json(&value),
                Ok(None) => {
                    eprintln!("[runlog show] workflow no encontrado: {id_text}");
                    std::process::exit(4);
                }
                Err(e) => {
                    eprintln!("[runlog show] error de consulta: {e}");
                    std::process::exit(5);
                }
            }
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("[runlog show] error serializando salida: {e}");
            std::process::exit(5);
        }
    }
}
