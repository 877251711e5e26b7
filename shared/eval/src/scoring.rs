use crate::{report::Prediction, EvalError, Letter, NUM_CHOICES};
use lmeval_core::argmax;
use lmeval_modeling::{encode_ids, CausalLM};
use tch::{Device, Kind, Tensor};
use tokenizers::Tokenizer;
use tracing::warn;

/// How the answer labels A-D look to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelTokens {
    /// Every label is a single token, so one forward pass scores all four.
    Single([i64; NUM_CHOICES]),
    /// At least one label spans several tokens; each is scored by the log-likelihood of its
    /// whole continuation.
    Multi([Vec<i64>; NUM_CHOICES]),
}

impl LabelTokens {
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self, EvalError> {
        let mut encodings: [Vec<i64>; NUM_CHOICES] = Default::default();
        for (slot, letter) in encodings.iter_mut().zip(Letter::ALL) {
            *slot = encode_ids(tokenizer, letter.as_str())?;
        }
        Self::from_encodings(encodings)
    }

    pub fn from_encodings(encodings: [Vec<i64>; NUM_CHOICES]) -> Result<Self, EvalError> {
        if let Some(letter) = Letter::ALL
            .into_iter()
            .find(|x| encodings[x.index()].is_empty())
        {
            return Err(EvalError::EmptyLabel(letter));
        }
        if encodings.iter().all(|x| x.len() == 1) {
            return Ok(LabelTokens::Single(encodings.map(|x| x[0])));
        }
        warn!("Answer labels span several tokens ({encodings:?}), scoring full continuations");
        Ok(LabelTokens::Multi(encodings))
    }

    /// Tokens that get appended to the prompt when scoring.
    pub fn continuation_len(&self) -> usize {
        match self {
            LabelTokens::Single(_) => 0,
            LabelTokens::Multi(encodings) => encodings.iter().map(|x| x.len()).max().unwrap_or(0),
        }
    }

    /// Probability the model assigns to each label following `context`.
    pub fn probabilities<M: CausalLM>(
        &self,
        model: &mut M,
        context: &[i64],
    ) -> Result<[f32; NUM_CHOICES], EvalError> {
        match self {
            LabelTokens::Single(ids) => next_token_probabilities(model, context, ids),
            LabelTokens::Multi(encodings) => continuation_probabilities(model, context, encodings),
        }
    }
}

/// Softmax over the whole vocabulary at the last position, read off at the label tokens.
/// The four values sum to at most 1.
fn next_token_probabilities<M: CausalLM>(
    model: &mut M,
    context: &[i64],
    label_ids: &[i64; NUM_CHOICES],
) -> Result<[f32; NUM_CHOICES], EvalError> {
    let ids = Tensor::from_slice(context).to(model.device()).unsqueeze(0);
    let logits = model.forward(&ids, Some(1));
    let probs = logits
        .view(-1)
        .to_kind(Kind::Float)
        .softmax(-1, Kind::Float);
    let index = Tensor::from_slice(label_ids).to(probs.device());
    let probs: Vec<f32> = probs.gather(-1, &index, false).to(Device::Cpu).try_into()?;
    let mut out = [0f32; NUM_CHOICES];
    out.copy_from_slice(&probs);
    Ok(out)
}

fn continuation_probabilities<M: CausalLM>(
    model: &mut M,
    context: &[i64],
    encodings: &[Vec<i64>; NUM_CHOICES],
) -> Result<[f32; NUM_CHOICES], EvalError> {
    let mut out = [0f32; NUM_CHOICES];
    for (slot, choice) in out.iter_mut().zip(encodings) {
        let mut ids = context.to_vec();
        ids.extend_from_slice(choice);
        let ids = Tensor::from_slice(&ids).to(model.device()).unsqueeze(0);
        // a continuation of N tokens is predicted by the last N + 1 positions; the final one
        // predicts whatever follows the continuation and is dropped
        let logits = model.forward(&ids, Some((choice.len() + 1) as i64));
        let logits = logits
            .to_kind(Kind::Float)
            .log_softmax(-1, Kind::Float)
            .squeeze_dim(0)
            .slice(0, 0, choice.len() as i64, 1);
        let index = Tensor::from_slice(choice).to(logits.device()).unsqueeze(-1);
        let loglikelihood: f32 = logits.gather(-1, &index, false).sum(Kind::Float).try_into()?;
        *slot = loglikelihood.exp();
    }
    Ok(out)
}

/// Picks the most probable label, earliest letter first on ties.
pub fn predict(probs: [f32; NUM_CHOICES], answer: Letter) -> Prediction {
    let predicted = argmax(&probs)
        .and_then(Letter::from_index)
        .unwrap_or(Letter::A);
    Prediction {
        predicted,
        answer,
        correct: predicted == answer,
        probs,
    }
}
