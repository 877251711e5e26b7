use crate::{
    document::{Document, DocumentSource, Letter, NUM_CHOICES},
    EvalError,
};
use anyhow::Result;
use lmeval_data_provider::{
    download_dataset_repo_sync, local_repo_files, Dataset, ListAccessor, Row, RowAccessor, Split,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// MMLU questions read from the parquet files of a `cais/mmlu`-style dataset repo.
pub struct MMLU {
    repo_files: Vec<PathBuf>,
}

impl MMLU {
    pub const DEFAULT_REPO: &'static str = "cais/mmlu";

    pub fn from_hub(
        repo_id: &str,
        revision: Option<String>,
        subjects: &[String],
        progress_bar: bool,
    ) -> Result<Self> {
        info!("Fetching {} subjects from {repo_id}", subjects.len());
        let repo_files = download_dataset_repo_sync(
            repo_id,
            revision,
            Some(subjects),
            None,
            None,
            progress_bar,
        )?;
        Ok(Self { repo_files })
    }

    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            repo_files: local_repo_files(dir)?,
        })
    }

    pub fn from_files(repo_files: Vec<PathBuf>) -> Self {
        Self { repo_files }
    }

    pub const fn name() -> &'static str {
        "MMLU"
    }

    fn row_to_document(
        subject: &str,
        index: usize,
        dataset: &Dataset,
        row: &Row,
    ) -> Result<Document, EvalError> {
        let malformed = |reason: String| EvalError::MalformedRow {
            subject: subject.to_owned(),
            row: index,
            reason,
        };
        let column = |name: &str| {
            dataset
                .get_column_id(name)
                .ok_or_else(|| malformed(format!("missing column {name}")))
        };

        let question = row
            .get_string(column("question")?)
            .map_err(|e| malformed(format!("question: {e}")))?
            .to_owned();
        let options = row
            .get_list(column("choices")?)
            .map_err(|e| malformed(format!("choices: {e}")))?;
        if options.len() != NUM_CHOICES {
            return Err(malformed(format!(
                "expected {NUM_CHOICES} choices, found {}",
                options.len()
            )));
        }
        let mut choices: [String; NUM_CHOICES] = Default::default();
        for (i, choice) in choices.iter_mut().enumerate() {
            *choice = options
                .get_string(i)
                .map_err(|e| malformed(format!("choice {i}: {e}")))?
                .to_owned();
        }

        // the hub stores the answer as a class index; some mirrors use the letter instead
        let answer_column = column("answer")?;
        let answer = match row
            .get_long(answer_column)
            .or_else(|_| row.get_int(answer_column).map(i64::from))
        {
            Ok(index) => usize::try_from(index).ok().and_then(Letter::from_index),
            Err(_) => row
                .get_string(answer_column)
                .ok()
                .and_then(|x| x.parse().ok()),
        }
        .ok_or_else(|| malformed("answer is not one of A, B, C, D".to_owned()))?;

        Ok(Document {
            question,
            choices,
            answer,
        })
    }
}

impl DocumentSource for MMLU {
    fn documents(&self, subject: &str, split: Split) -> Result<Vec<Document>> {
        let dataset = Dataset::load_dataset(&self.repo_files, Some(split), Some(subject))?;
        let mut docs = Vec::with_capacity(dataset.num_rows());
        for (index, row) in dataset.iter().enumerate() {
            docs.push(Self::row_to_document(subject, index, &dataset, &row?)?);
        }
        info!("Loaded {} {split} questions for {subject}", docs.len());
        Ok(docs)
    }
}
