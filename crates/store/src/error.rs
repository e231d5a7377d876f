use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be read back into its Rust type.
    #[error("invalid value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    /// A uniqueness constraint rejected the row.
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
