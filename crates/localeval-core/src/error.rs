use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid schema for {name}: {message}")]
    Schema { name: &'static str, message: String },

    #[error("{name} still invalid after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        name: &'static str,
        attempts: u32,
        last_error: String,
    },
}

pub type LlmResult<T> = Result<T, LlmError>;
