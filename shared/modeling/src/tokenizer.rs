use std::path::PathBuf;
use thiserror::Error;
use tokenizers::Tokenizer;

#[derive(Error, Debug)]
pub enum AutoTokenizerError {
    #[error("Failed to load tokenizer from tokenizer.json")]
    CouldntLoadTokenizer(#[from] tokenizers::Error),

    #[error("Could not find tokenizer.json")]
    FileNotFound,
}

#[derive(Error, Debug)]
#[error("Failed to tokenize {text:?}: {source}")]
pub struct TokenizeError {
    text: String,
    source: tokenizers::Error,
}

pub fn auto_tokenizer(repo_files: &[PathBuf]) -> Result<Tokenizer, AutoTokenizerError> {
    match repo_files.iter().find(|x| x.ends_with("tokenizer.json")) {
        Some(path) => Ok(Tokenizer::from_file(path.as_path())?),
        None => Err(AutoTokenizerError::FileNotFound),
    }
}

/// Encodes `text` without special tokens, as ids ready for a `tch` tensor.
pub fn encode_ids(tokenizer: &Tokenizer, text: &str) -> Result<Vec<i64>, TokenizeError> {
    let encoding = tokenizer
        .encode(text, false)
        .map_err(|source| TokenizeError {
            text: text.to_owned(),
            source,
        })?;
    Ok(encoding.get_ids().iter().map(|x| *x as i64).collect())
}
