mod config;
mod dashboard;
mod db;
mod error;
mod gateway;
mod ipc;
mod metrics;
mod model;
mod pagination;
mod scope;
mod store;

use config::{AppConfig, Clock};
use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    let filter = match &config.log_filter {
        Some(spec) => EnvFilter::try_new(spec).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // stdout carries the protocol; logs go to stderr only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

fn write_line(stdout: &mut io::Stdout, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    let _ = stdout.flush();
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config);

    let clock = match config.today {
        Some(d) => Clock::Fixed(d),
        None => Clock::System,
    };
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        clock,
    };
    if let Some(path) = config.workspace.clone() {
        match db::open_db(&path) {
            Ok(conn) => {
                tracing::info!(event = "workspace_opened", path = %path.display());
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => {
                tracing::error!(event = "workspace_open_failed", path = %path.display(), error = %e);
            }
        }
    }
    tracing::info!(event = "started", version = env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                tracing::warn!(event = "bad_json", error = %e);
                write_line(
                    &mut stdout,
                    &json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                );
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
    }
    Ok(())
}
