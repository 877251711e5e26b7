use tch::{Device, Tensor};

/// A causal language model that can be queried for next-token logits.
/// Its internals are hidden, so this can be impl'd for anything that maps a
/// batch of token ids to logits.
pub trait CausalLM: Send + std::fmt::Debug {
    /// Runs the model over `x` (`[batch, seq_len]` token ids) and returns logits of shape
    /// `[batch, n, vocab_size]`, where `n` is `num_logits_to_keep` (the last `n` positions)
    /// or the whole sequence.
    fn forward(&mut self, x: &Tensor, num_logits_to_keep: Option<i64>) -> Tensor;
    fn bos_token_id(&self) -> Option<i64>;
    fn device(&self) -> Device;

    /// Longest sequence the model accepts, if it has a limit.
    fn max_context_len(&self) -> Option<usize> {
        None
    }
}
