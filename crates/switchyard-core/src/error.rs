use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwitchyardError {
    // Generation capability errors
    #[error("Generation request failed: {0}")]
    Generation(String),

    #[error("Generation response parse error: {0}")]
    GenerationParse(String),

    // Search capability errors
    #[error("Web search failed: {0}")]
    Search(String),

    // Graph errors
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // Queue errors
    #[error("Task queue error: {0}")]
    Queue(String),

    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwitchyardError>;
