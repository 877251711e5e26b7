mod dummy;
mod llama;
mod llama_for_causal_lm;
mod safetensor_utils;
mod tokenizer;
mod traits;

pub use dummy::DummyModel;
pub use llama::{Config, Llama, Llama3RopeConfig, Llama3RopeType, LlamaEosToks, RotaryEmbedding};
pub use llama_for_causal_lm::{
    AttentionImplementation, LlamaConfig, LlamaForCausalLM, LoadModelError,
};
pub use safetensor_utils::{load_safetensors_into_variables, LoadSafetensorsError};
pub use tokenizer::{auto_tokenizer, encode_ids, AutoTokenizerError, TokenizeError};
pub use traits::CausalLM;
