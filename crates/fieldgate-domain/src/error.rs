use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provision plan not found: {0}")]
    PlanNotFound(String),

    #[error("Invalid provision plan: {0}")]
    InvalidPlan(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("CSE rejected request: status={status} path={path}")]
    CseRejected { status: u16, path: String },

    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
