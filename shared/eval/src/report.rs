use crate::{subject_info, Benchmark, Category, EvalError, Letter, NUM_CHOICES};
use lmeval_core::{mean, Tally};
use serde::Serialize;
use serde_json::json;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::warn;

/// The graded answer to one test question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted: Letter,
    pub answer: Letter,
    pub correct: bool,
    pub probs: [f32; NUM_CHOICES],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectResult {
    pub subject: String,
    pub predictions: Vec<Prediction>,
    pub accuracy: f64,
}

impl SubjectResult {
    pub fn from_predictions(subject: impl Into<String>, predictions: Vec<Prediction>) -> Self {
        let subject = subject.into();
        let tally: Tally = predictions.iter().map(|x| x.correct).collect();
        let accuracy = tally.accuracy().unwrap_or_else(|| {
            warn!("No test questions for {subject}, counting its accuracy as 0");
            0.0
        });
        Self {
            subject,
            predictions,
            accuracy,
        }
    }

    pub fn tally(&self) -> Tally {
        self.predictions.iter().map(|x| x.correct).collect()
    }

    pub fn correctness(&self) -> Vec<bool> {
        self.predictions.iter().map(|x| x.correct).collect()
    }

    pub fn probabilities(&self) -> Vec<[f32; NUM_CHOICES]> {
        self.predictions.iter().map(|x| x.probs).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub benchmark: Benchmark,
    pub model: String,
    pub num_fewshot: usize,
    pub subjects: Vec<SubjectResult>,
}

impl EvaluationReport {
    pub fn new(
        benchmark: Benchmark,
        model: impl Into<String>,
        num_fewshot: usize,
        subjects: Vec<SubjectResult>,
    ) -> Self {
        Self {
            benchmark,
            model: model.into(),
            num_fewshot,
            subjects,
        }
    }

    /// Unweighted mean of the subject accuracies.
    pub fn overall(&self) -> f64 {
        mean(
            &self
                .subjects
                .iter()
                .map(|x| x.accuracy)
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default()
    }

    /// Fraction of all test questions answered correctly, regardless of subject.
    pub fn weighted_accuracy(&self) -> f64 {
        self.subjects
            .iter()
            .map(|x| x.tally())
            .sum::<Tally>()
            .accuracy()
            .unwrap_or_default()
    }

    fn grouped<K: Ord>(&self, key: impl Fn(&str) -> Option<K>) -> BTreeMap<K, f64> {
        let mut tallies: BTreeMap<K, Tally> = BTreeMap::new();
        for result in &self.subjects {
            match key(&result.subject) {
                Some(k) => *tallies.entry(k).or_default() += result.tally(),
                None => warn!("{} is not a known MMLU subject, leaving it out of groups", result.subject),
            }
        }
        tallies
            .into_iter()
            .filter_map(|(k, tally)| tally.accuracy().map(|acc| (k, acc)))
            .collect()
    }

    /// Weighted accuracy of each subcategory that has graded questions.
    pub fn subcategory_accuracies(&self) -> BTreeMap<&'static str, f64> {
        self.grouped(|subject| subject_info(subject).map(|x| x.subcategory))
    }

    /// Weighted accuracy of each category that has graded questions.
    pub fn category_accuracies(&self) -> BTreeMap<Category, f64> {
        self.grouped(|subject| subject_info(subject).map(|x| x.category()))
    }

    /// `{dir}/{benchmark}_{model}.{extension}`, with path separators in the model id replaced.
    pub fn output_path(&self, dir: &Path, extension: &str) -> PathBuf {
        let model = self.model.replace(['/', '\\'], "_");
        dir.join(format!("{}_{model}.{extension}", self.benchmark.name()))
    }

    /// Writes the overall score as plain text and returns the file's path.
    pub fn write_score(&self, dir: &Path) -> Result<PathBuf, EvalError> {
        let path = self.output_path(dir, "txt");
        write(&path, format!("{:.4}\n", self.overall()))?;
        Ok(path)
    }

    /// Writes every prediction along with the aggregate scores as JSON.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf, EvalError> {
        let path = self.output_path(dir, "json");
        let categories: BTreeMap<String, f64> = self
            .category_accuracies()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let value = json!({
            "overall": self.overall(),
            "weighted_accuracy": self.weighted_accuracy(),
            "categories": categories,
            "subcategories": self.subcategory_accuracies(),
            "report": self,
        });
        write(&path, serde_json::to_string_pretty(&value)?)?;
        Ok(path)
    }
}

fn write(path: &Path, contents: String) -> Result<(), EvalError> {
    let wrap = |source| EvalError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::write(path, contents).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prediction(correct: bool) -> Prediction {
        Prediction {
            predicted: Letter::A,
            answer: if correct { Letter::A } else { Letter::B },
            correct,
            probs: [0.4, 0.3, 0.2, 0.1],
        }
    }

    fn result(subject: &str, outcomes: &[bool]) -> SubjectResult {
        SubjectResult::from_predictions(subject, outcomes.iter().map(|x| prediction(*x)).collect())
    }

    fn report(subjects: Vec<SubjectResult>) -> EvaluationReport {
        EvaluationReport::new(Benchmark::Mmlu, "NousResearch/Llama-2-7b-hf", 5, subjects)
    }

    #[test]
    fn test_subject_accuracy() {
        let result = result("anatomy", &[true, true, false]);
        assert!((result.accuracy - 0.667).abs() < 1e-3);
        assert_eq!(result.correctness(), vec![true, true, false]);
        assert_eq!(result.probabilities().len(), 3);
    }

    #[test]
    fn test_empty_subject_scores_zero() {
        assert_eq!(result("anatomy", &[]).accuracy, 0.0);
    }

    #[test]
    fn test_overall_is_mean_of_subject_accuracies() {
        let mut subjects = vec![
            result("abstract_algebra", &[true]),
            result("anatomy", &[true]),
            result("astronomy", &[true]),
        ];
        for (subject, accuracy) in subjects.iter_mut().zip([0.340, 0.607, 0.757]) {
            subject.accuracy = accuracy;
        }
        let report = report(subjects);
        assert!((report.overall() - 0.568).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_and_grouped_accuracy() {
        let report = report(vec![
            result("abstract_algebra", &[true, false, false, false]),
            result("college_mathematics", &[true, true, true, true]),
            result("anatomy", &[true, true]),
        ]);
        // (1 + 4 + 2) / 10
        assert!((report.weighted_accuracy() - 0.7).abs() < 1e-9);
        // mean of 0.25, 1.0 and 1.0
        assert!((report.overall() - 0.75).abs() < 1e-9);

        let categories = report.category_accuracies();
        assert_eq!(categories.get(&Category::Stem), Some(&(5.0 / 8.0)));
        assert_eq!(categories.get(&Category::Other), Some(&1.0));
        assert_eq!(categories.get(&Category::Humanities), None);

        let subcategories = report.subcategory_accuracies();
        assert_eq!(subcategories.get("math"), Some(&(5.0 / 8.0)));
        assert_eq!(subcategories.get("health"), Some(&1.0));
    }

    #[test]
    fn test_write_score() {
        let dir = tempfile::tempdir().unwrap();
        let report = report(vec![result("anatomy", &[true, true, false, false])]);
        let path = report.write_score(dir.path()).unwrap();
        assert_eq!(
            path,
            dir.path().join("mmlu_NousResearch_Llama-2-7b-hf.txt")
        );
        assert_eq!(std::fs::read_to_string(path).unwrap(), "0.5000\n");
    }

    #[test]
    fn test_output_path_keeps_dots_in_model_id() {
        let report = EvaluationReport::new(Benchmark::Mmlu, "meta-llama/Llama-3.1-8B", 5, vec![]);
        assert_eq!(
            report.output_path(Path::new("results"), "txt"),
            PathBuf::from("results/mmlu_meta-llama_Llama-3.1-8B.txt")
        );
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = report(vec![result("anatomy", &[true, false])]);
        let path = report.write_json(&dir.path().join("nested")).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["overall"], json!(0.5));
        assert_eq!(value["report"]["benchmark"], json!("mmlu"));
        assert_eq!(value["report"]["subjects"][0]["predictions"][1]["answer"], json!("B"));
        assert_eq!(value["categories"]["other (business, health, misc.)"], json!(0.5));
    }
}
