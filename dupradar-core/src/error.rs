use thiserror::Error;

#[derive(Error, Debug)]
pub enum DupRadarError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(&'static str),

    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
}
