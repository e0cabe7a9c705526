use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("training dataset unavailable ({0})")]
    DatasetUnavailable(String),
    #[error("model not ready")]
    ModelUnavailable,
    #[error("report storage failure")]
    Storage(#[source] sqlx::Error),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err)
    }
}
