use crate::Letter;
use lmeval_modeling::TokenizeError;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Unknown benchmark {0}")]
    UnknownBenchmark(String),

    #[error("Unknown MMLU subject {0}")]
    UnknownSubject(String),

    #[error("{subject} row {row}: {reason}")]
    MalformedRow {
        subject: String,
        row: usize,
        reason: String,
    },

    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error("answer label {0} encodes to no tokens")]
    EmptyLabel(Letter),

    #[error("prompt for {subject} question {index} is empty")]
    EmptyPrompt { subject: String, index: usize },

    #[error("tensor operation failed: {0}")]
    Tch(#[from] tch::TchError),

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
