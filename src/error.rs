use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("{role} role may not call {method}")]
    Forbidden { role: &'static str, method: String },
    #[error("{0}")]
    NotScoped(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store error: {0}")]
    Store(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::Forbidden { .. } => "forbidden",
            CoreError::NotScoped(_) => "not_scoped",
            CoreError::NotFound(_) => "not_found",
            CoreError::Validation(_) => "bad_params",
            CoreError::Sqlite(_) | CoreError::Store(_) => "db_query_failed",
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    /// Denials are logged at warn; everything else is routine.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            CoreError::Unauthenticated | CoreError::Forbidden { .. } | CoreError::NotScoped(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
