use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("schema extraction failed: {0}")]
    Extract(String),

    #[error("grading task failed: {0}")]
    Task(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<schemagrade_core::Error> for GradeError {
    fn from(err: schemagrade_core::Error) -> Self {
        match err {
            schemagrade_core::Error::InvalidConfig(message) => Self::Config(message),
            other => Self::Schema(other.to_string()),
        }
    }
}
