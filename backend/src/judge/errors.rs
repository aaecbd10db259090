use thiserror::Error;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed judge payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid response from judge: {0}")]
    InvalidResponse(String),

    #[error("judge rejected query: {0}")]
    Rejected(String),

    #[error("credential contains characters not allowed in a header")]
    InvalidCredential,
}
