use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("query composition invariant broken: {0}")]
    Composition(String),
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("engine rejected query: {0}")]
    EngineRejected(String),
    #[error("unmappable result: {0}")]
    Mapping(String),
}

impl SearchError {
    /// Only transient transport failures are worth another attempt;
    /// a rejected query is deterministic and will fail again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::EngineUnavailable(_))
    }

    /// Status code embedded in the response envelope. The transport
    /// status stays 200; callers read this field instead.
    pub fn envelope_status(&self) -> u16 {
        match self {
            SearchError::Validation(_) => 400,
            SearchError::Composition(_) | SearchError::EngineRejected(_) => 500,
            SearchError::EngineUnavailable(_) | SearchError::Mapping(_) => 502,
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
