use serde::Serialize;

mod document;
mod error;
mod harness;
mod prompt;
mod report;
mod scoring;
mod subjects;
mod tasks;

pub use document::{Document, DocumentSource, InMemorySource, Letter, NUM_CHOICES};
pub use error::EvalError;
pub use harness::{evaluate_subject, EvalOptions, PreparedSubject, SubjectTask};
pub use prompt::{fit_prompt, format_example, format_prompt, format_subject, FittedPrompt};
pub use report::{EvaluationReport, Prediction, SubjectResult};
pub use scoring::{predict, LabelTokens};
pub use subjects::{all_subjects, subject_info, Category, SubjectInfo, SUBJECTS};
pub use tasks::MMLU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Benchmark {
    Mmlu,
}

pub const ALL_BENCHMARK_NAMES: [&str; 1] = [Benchmark::Mmlu.name()];

impl Benchmark {
    pub const fn name(self) -> &'static str {
        match self {
            Benchmark::Mmlu => "mmlu",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, EvalError> {
        match name.trim().to_lowercase().as_str() {
            "mmlu" => Ok(Benchmark::Mmlu),
            _ => Err(EvalError::UnknownBenchmark(name.to_owned())),
        }
    }
}

/// Checks every name against the MMLU subject list; an empty list means all subjects.
pub fn resolve_subjects(names: &[String]) -> Result<Vec<String>, EvalError> {
    if names.is_empty() {
        return Ok(all_subjects().map(|x| x.to_owned()).collect());
    }
    names
        .iter()
        .map(|name| match subject_info(name) {
            Some(info) => Ok(info.name.to_owned()),
            None => Err(EvalError::UnknownSubject(name.clone())),
        })
        .collect()
}
