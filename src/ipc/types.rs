use std::path::PathBuf;

use crate::config::Clock;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    /// `{ userId, role }` as asserted by the caller; checked by the gateway.
    #[serde(default)]
    pub actor: Option<serde_json::Value>,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub clock: Clock,
}
