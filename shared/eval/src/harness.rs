use crate::{
    prompt::fit_prompt,
    report::SubjectResult,
    scoring::{predict, LabelTokens},
    Document, DocumentSource, EvalError, Letter,
};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use lmeval_core::Tally;
use lmeval_data_provider::Split;
use lmeval_modeling::CausalLM;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Worked examples from the dev split to put in front of every question.
    pub num_fewshot: usize,
    /// Longest prompt to feed the model, in tokens. Capped further by the model's own limit.
    pub max_context_len: Option<usize>,
    /// Only grade the first `limit` test questions of each subject.
    pub limit: Option<usize>,
    /// Shuffle the dev split with this seed before picking worked examples.
    pub seed: Option<u64>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            num_fewshot: 5,
            max_context_len: Some(2048),
            limit: None,
            seed: None,
        }
    }
}

/// The questions of one subject, ready to be turned into prompts.
pub struct SubjectTask {
    subject: String,
    dev: Vec<Document>,
    test: Vec<Document>,
}

impl SubjectTask {
    pub fn new(subject: impl Into<String>, dev: Vec<Document>, test: Vec<Document>) -> Self {
        Self {
            subject: subject.into(),
            dev,
            test,
        }
    }

    pub fn load<S: DocumentSource + ?Sized>(source: &S, subject: &str) -> Result<Self> {
        Ok(Self::new(
            subject,
            source.documents(subject, Split::Dev)?,
            source.documents(subject, Split::Test)?,
        ))
    }

    /// Renders and tokenizes a prompt for every test question. `max_context_len` bounds the
    /// prompt plus the longest answer label.
    pub fn prepare(
        mut self,
        tokenizer: &Tokenizer,
        labels: &LabelTokens,
        bos_token_id: Option<i64>,
        max_context_len: Option<usize>,
        options: &EvalOptions,
    ) -> Result<PreparedSubject, EvalError> {
        info!("Preparing {}", self.subject);
        let budget = max_context_len.map(|x| x.saturating_sub(labels.continuation_len()));

        if let Some(seed) = options.seed {
            let mut bytes = [0u8; 32];
            bytes[24..32].copy_from_slice(&seed.to_be_bytes());
            self.dev.shuffle(&mut ChaCha8Rng::from_seed(bytes));
        }
        if self.dev.len() < options.num_fewshot {
            warn!(
                "{} has only {} dev examples, fewer than the {} shots asked for",
                self.subject,
                self.dev.len(),
                options.num_fewshot
            );
        }
        self.dev.truncate(options.num_fewshot);
        if let Some(limit) = options.limit {
            self.test.truncate(limit);
        }

        let mut questions = Vec::with_capacity(self.test.len());
        for (index, doc) in self.test.iter().enumerate() {
            let fitted = fit_prompt(
                tokenizer,
                bos_token_id,
                &self.subject,
                &self.dev,
                doc,
                budget,
            )?;
            if fitted.tokens.is_empty() {
                return Err(EvalError::EmptyPrompt {
                    subject: self.subject.clone(),
                    index,
                });
            }
            if fitted.truncated {
                warn!(
                    "{} question {index} doesn't fit in {budget:?} tokens even zero-shot, truncating",
                    self.subject
                );
            } else if fitted.num_fewshot < self.dev.len() {
                debug!(
                    "{} question {index} fits only {} shots",
                    self.subject, fitted.num_fewshot
                );
            }
            questions.push(TokenizedQuestion {
                context: fitted.tokens,
                answer: doc.answer,
                num_fewshot: fitted.num_fewshot,
            });
        }
        Ok(PreparedSubject {
            subject: self.subject,
            questions,
            labels: labels.clone(),
        })
    }
}

#[derive(Debug)]
struct TokenizedQuestion {
    context: Vec<i64>,
    answer: Letter,
    num_fewshot: usize,
}

#[derive(Debug)]
pub struct PreparedSubject {
    subject: String,
    questions: Vec<TokenizedQuestion>,
    labels: LabelTokens,
}

impl PreparedSubject {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Worked examples that made it into each question's prompt.
    pub fn fewshot_counts(&self) -> Vec<usize> {
        self.questions.iter().map(|x| x.num_fewshot).collect()
    }

    pub fn context_lengths(&self) -> Vec<usize> {
        self.questions.iter().map(|x| x.context.len()).collect()
    }

    /// Grades every question in order. Inference errors are returned as-is.
    pub fn run<M: CausalLM>(
        &self,
        model: &mut M,
        progress_bar: bool,
    ) -> Result<SubjectResult, EvalError> {
        let pbar = match progress_bar {
            false => None,
            true => {
                info!("Running {}", self.subject);
                let pbar = ProgressBar::new(self.questions.len() as u64);
                pbar.set_style(ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"));
                Some(pbar)
            }
        };

        let mut tally = Tally::new();
        let mut predictions = Vec::with_capacity(self.questions.len());
        for (index, question) in self.questions.iter().enumerate() {
            let probs = self.labels.probabilities(model, &question.context)?;
            let prediction = predict(probs, question.answer);
            debug!(
                "{} question {index}: predicted {} answer {} probs {:?}",
                self.subject, prediction.predicted, prediction.answer, prediction.probs
            );
            tally.record(prediction.correct);
            predictions.push(prediction);

            if let Some(pbar) = &pbar {
                pbar.set_message(format!("acc: {:.3}", tally.accuracy().unwrap_or_default()));
                pbar.inc(1);
            }
        }
        if let Some(pbar) = pbar {
            pbar.finish_and_clear();
        }
        Ok(SubjectResult::from_predictions(&self.subject, predictions))
    }
}

fn tightest(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Loads, prepares and grades one subject. `labels` come from
/// [`LabelTokens::from_tokenizer`] and can be shared by every subject of a run.
pub fn evaluate_subject<M: CausalLM, S: DocumentSource + ?Sized>(
    source: &S,
    subject: &str,
    model: &mut M,
    tokenizer: &Tokenizer,
    labels: &LabelTokens,
    options: &EvalOptions,
    progress_bar: bool,
) -> Result<SubjectResult> {
    let task = SubjectTask::load(source, subject)?;
    let max_context_len = tightest(options.max_context_len, model.max_context_len());
    let prepared = task.prepare(tokenizer, labels, model.bos_token_id(), max_context_len, options)?;
    Ok(prepared.run(model, progress_bar)?)
}
