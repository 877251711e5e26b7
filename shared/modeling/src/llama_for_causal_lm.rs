use crate::{
    llama::{Config, Llama, Llama3RopeConfig, LlamaEosToks, RotaryEmbedding},
    safetensor_utils::load_safetensors_into_variables,
    CausalLM, LoadSafetensorsError,
};
use std::{io, path::PathBuf};
use tch::{
    nn::{self, Module, VarStore},
    Device, Kind, Tensor,
};
use thiserror::Error;
use tracing::info;

/// The subset of a Hugging Face `config.json` needed to build a Llama model.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct LlamaConfig {
    pub hidden_size: usize,
    pub intermediate_size: usize,
    pub vocab_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub num_key_value_heads: Option<usize>,
    pub rms_norm_eps: f64,
    #[serde(default = "default_rope")]
    pub rope_theta: f32,
    pub bos_token_id: Option<u32>,
    pub eos_token_id: Option<LlamaEosToks>,
    pub rope_scaling: Option<Llama3RopeConfig>,
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub tie_word_embeddings: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttentionImplementation {
    Eager,
    #[default]
    Sdpa,
}

impl LlamaConfig {
    pub fn num_key_value_heads(&self) -> usize {
        self.num_key_value_heads.unwrap_or(self.num_attention_heads)
    }

    pub fn into_config(self, attn_implementation: AttentionImplementation) -> Config {
        Config {
            hidden_size: self.hidden_size,
            intermediate_size: self.intermediate_size,
            vocab_size: self.vocab_size,
            num_hidden_layers: self.num_hidden_layers,
            num_attention_heads: self.num_attention_heads,
            num_key_value_heads: self.num_key_value_heads(),
            rms_norm_eps: self.rms_norm_eps,
            rope_theta: self.rope_theta,
            bos_token_id: self.bos_token_id,
            eos_token_id: self.eos_token_id,
            rope_scaling: self.rope_scaling,
            max_position_embeddings: self.max_position_embeddings,
            use_sdpa: attn_implementation == AttentionImplementation::Sdpa,
        }
    }
}

fn default_rope() -> f32 {
    10_000.0
}

#[derive(Debug)]
enum LmHead {
    Linear(nn::Linear),
    /// Reuses the token embedding matrix as the output projection.
    Tied,
}

#[derive(Debug)]
pub struct LlamaForCausalLM {
    pub model: Llama,
    pub config: Config,
    pub variables: VarStore,
    pub device: Device,
    lm_head: LmHead,
    rope: RotaryEmbedding,
}

#[derive(Debug, Error)]
pub enum LoadModelError {
    #[error("missing config.json")]
    MissingConfigJSON,

    #[error("failed to read file config.json")]
    FailedToReadConfig(#[from] io::Error),

    #[error("could not parse config.json")]
    FailedToParseConfig(#[from] serde_json::Error),

    #[error("hidden size {hidden_size} is not divisible by {num_attention_heads} attention heads")]
    BadHeadCount {
        hidden_size: usize,
        num_attention_heads: usize,
    },

    #[error("Failed to load safetensors from disk: {0}")]
    LoadSafetensorsError(#[from] LoadSafetensorsError),
}

impl LlamaForCausalLM {
    /// Builds the model described by `config.json` in `repo_files` and fills it with the
    /// weights from the repo's safetensors files. Without a device, CUDA is used when present.
    pub fn from_pretrained(
        repo_files: &[PathBuf],
        kind: Option<Kind>,
        attn_implementation: Option<AttentionImplementation>,
        device: Option<Device>,
    ) -> Result<Self, LoadModelError> {
        let config_file = std::fs::read_to_string(
            repo_files
                .iter()
                .find(|x| x.ends_with("config.json"))
                .ok_or(LoadModelError::MissingConfigJSON)?
                .as_path(),
        )?;
        let llama_config: LlamaConfig = serde_json::from_str(&config_file)?;
        if llama_config.num_attention_heads == 0
            || llama_config.hidden_size % llama_config.num_attention_heads != 0
        {
            return Err(LoadModelError::BadHeadCount {
                hidden_size: llama_config.hidden_size,
                num_attention_heads: llama_config.num_attention_heads,
            });
        }
        let tied = llama_config.tie_word_embeddings;
        let config = llama_config.into_config(attn_implementation.unwrap_or_default());

        let device = device.unwrap_or(Device::cuda_if_available());
        info!(
            "Loading {}-layer model on {device:?} ({} tied embeddings)",
            config.num_hidden_layers,
            if tied { "with" } else { "without" }
        );
        let mut variables = VarStore::new(device);
        let (model, lm_head) = {
            let _no_grad = tch::no_grad_guard();
            let model = Llama::new(variables.root(), &config);
            let lm_head = match tied {
                true => LmHead::Tied,
                false => LmHead::Linear(nn::linear(
                    &variables.root() / "lm_head",
                    config.hidden_size as i64,
                    config.vocab_size as i64,
                    nn::LinearConfig {
                        bias: false,
                        ..Default::default()
                    },
                )),
            };
            if let Some(kind) = kind {
                variables.set_kind(kind);
            }
            load_safetensors_into_variables(&mut variables, repo_files)?;
            (model, lm_head)
        };
        let rope = RotaryEmbedding::new(kind.unwrap_or(Kind::Float), &config, device);
        Ok(LlamaForCausalLM {
            model,
            config,
            variables,
            device,
            lm_head,
            rope,
        })
    }
}

impl CausalLM for LlamaForCausalLM {
    fn forward(&mut self, x: &Tensor, num_logits_to_keep: Option<i64>) -> Tensor {
        let (_, t) = x.size2().unwrap();
        let mut x = self.model.forward(x, &self.rope);
        if let Some(num_logits_to_keep) = num_logits_to_keep {
            // only project the positions we were asked for
            x = x.slice(1, t - num_logits_to_keep.min(t), t, 1);
        }
        match &self.lm_head {
            LmHead::Linear(lm_head) => lm_head.forward(&x),
            LmHead::Tied => x.matmul(&self.model.embedding_weight().tr()),
        }
    }

    fn bos_token_id(&self) -> Option<i64> {
        self.config.bos_token_id.map(|x| x as i64)
    }

    fn device(&self) -> Device {
        self.device
    }

    fn max_context_len(&self) -> Option<usize> {
        Some(self.config.max_position_embeddings)
    }
}
