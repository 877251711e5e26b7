use std::fmt::{Debug, Formatter};

use tch::{Device, Kind, Tensor};

use crate::CausalLM;

type Oracle = Box<dyn FnMut(&[i64]) -> Vec<f32> + Send>;

/// A model whose next-token logits come from a closure over the token prefix.
/// Useful for exercising evaluation code without loading weights.
pub struct DummyModel {
    vocab_size: usize,
    bos_token_id: Option<i64>,
    oracle: Oracle,
    forward_calls: usize,
}

impl DummyModel {
    /// `oracle` receives the tokens up to and including a position and returns the logits for
    /// the token that follows. Short rows are padded with zeros.
    pub fn new(vocab_size: usize, oracle: impl FnMut(&[i64]) -> Vec<f32> + Send + 'static) -> Self {
        Self {
            vocab_size,
            bos_token_id: None,
            oracle: Box::new(oracle),
            forward_calls: 0,
        }
    }

    /// A model that puts all of its logit mass on `token`, whatever the input.
    pub fn always(vocab_size: usize, token: i64) -> Self {
        Self::new(vocab_size, move |_| {
            let mut logits = vec![0.0; vocab_size];
            if let Some(x) = logits.get_mut(token as usize) {
                *x = 10.0;
            }
            logits
        })
    }

    pub fn with_bos_token_id(mut self, bos_token_id: i64) -> Self {
        self.bos_token_id = Some(bos_token_id);
        self
    }

    pub fn forward_calls(&self) -> usize {
        self.forward_calls
    }
}

impl Debug for DummyModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyModel")
            .field("vocab_size", &self.vocab_size)
            .field("bos_token_id", &self.bos_token_id)
            .field("forward_calls", &self.forward_calls)
            .finish()
    }
}

impl CausalLM for DummyModel {
    fn forward(&mut self, x: &Tensor, num_logits_to_keep: Option<i64>) -> Tensor {
        self.forward_calls += 1;
        let ids = Vec::<i64>::try_from(x.view(-1).to_kind(Kind::Int64)).expect("int64 ids");
        let t = ids.len();
        let keep = num_logits_to_keep.map_or(t, |n| (n.max(0) as usize).min(t));
        let mut logits = Vec::with_capacity(keep * self.vocab_size);
        for end in (t - keep)..t {
            let mut row = (self.oracle)(&ids[..=end]);
            row.resize(self.vocab_size, 0.0);
            logits.extend(row);
        }
        Tensor::from_slice(&logits)
            .view([1, keep as i64, self.vocab_size as i64])
            .to(x.device())
    }

    fn bos_token_id(&self) -> Option<i64> {
        self.bos_token_id
    }

    fn device(&self) -> Device {
        Device::Cpu
    }
}
