use std::f32::consts::PI;
use tch::nn::{self, Module};
use tch::{Device, Kind, Tensor};

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Default)]
pub enum Llama3RopeType {
    #[serde(rename = "llama3")]
    Llama3,
    #[default]
    #[serde(rename = "default")]
    Default,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Default)]
pub struct Llama3RopeConfig {
    pub factor: f32,
    pub low_freq_factor: f32,
    pub high_freq_factor: f32,
    pub original_max_position_embeddings: usize,
    pub rope_type: Llama3RopeType,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum LlamaEosToks {
    Single(u32),
    Multiple(Vec<u32>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hidden_size: usize,
    pub intermediate_size: usize,
    pub vocab_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub num_key_value_heads: usize,
    pub rms_norm_eps: f64,
    pub rope_theta: f32,
    pub bos_token_id: Option<u32>,
    pub eos_token_id: Option<LlamaEosToks>,
    pub rope_scaling: Option<Llama3RopeConfig>,
    pub max_position_embeddings: usize,
    pub use_sdpa: bool,
}

/// Precomputed rotary embedding tables for every position up to `max_position_embeddings`.
#[derive(Debug)]
pub struct RotaryEmbedding {
    cos: Tensor,
    sin: Tensor,
}

fn default_inv_freq(cfg: &Config) -> Vec<f32> {
    let head_dim = cfg.hidden_size / cfg.num_attention_heads;
    (0..head_dim)
        .step_by(2)
        .map(|i| 1f32 / cfg.rope_theta.powf(i as f32 / head_dim as f32))
        .collect()
}

fn llama3_inv_freq(cfg: &Config, scaling: &Llama3RopeConfig) -> Vec<f32> {
    let original = scaling.original_max_position_embeddings as f32;
    let low_freq_wavelen = original / scaling.low_freq_factor;
    let high_freq_wavelen = original / scaling.high_freq_factor;
    default_inv_freq(cfg)
        .into_iter()
        .map(|freq| {
            let wavelen = 2. * PI / freq;
            if wavelen < high_freq_wavelen {
                freq
            } else if wavelen > low_freq_wavelen {
                freq / scaling.factor
            } else {
                let smooth = (original / wavelen - scaling.low_freq_factor)
                    / (scaling.high_freq_factor - scaling.low_freq_factor);
                (1. - smooth) * freq / scaling.factor + smooth * freq
            }
        })
        .collect()
}

impl RotaryEmbedding {
    pub fn new(kind: Kind, config: &Config, device: Device) -> Self {
        let inv_freq = match &config.rope_scaling {
            Some(
                scaling @ Llama3RopeConfig {
                    rope_type: Llama3RopeType::Llama3,
                    ..
                },
            ) => llama3_inv_freq(config, scaling),
            _ => default_inv_freq(config),
        };
        let inv_freq = Tensor::from_slice(&inv_freq).to(device);
        let positions = (config.max_position_embeddings + 1) as i64;
        let freqs = Tensor::arange(positions, (Kind::Float, device))
            .reshape([positions, 1])
            .matmul(&inv_freq.reshape([1i64, inv_freq.numel() as i64]));
        Self {
            cos: freqs.cos().to_kind(kind),
            sin: freqs.sin().to_kind(kind),
        }
    }

    fn apply(&self, x: &Tensor) -> Tensor {
        let (_, _, seq_len, _) = x.size4().unwrap();
        let cos = self.cos.narrow(0, 0, seq_len);
        let sin = self.sin.narrow(0, 0, seq_len);
        let cos = Tensor::cat(&[&cos, &cos], -1).unsqueeze(0).unsqueeze(0);
        let sin = Tensor::cat(&[&sin, &sin], -1).unsqueeze(0).unsqueeze(0);
        (x * cos) + (rotate_half(x) * sin)
    }
}

fn repeat_kv(hidden_states: &Tensor, n_rep: i64) -> Tensor {
    if n_rep == 1 {
        return hidden_states.shallow_clone();
    }
    let (batch, num_key_value_heads, slen, head_dim) = hidden_states.size4().unwrap();
    hidden_states
        .unsqueeze(2)
        .expand([batch, num_key_value_heads, n_rep, slen, head_dim], false)
        .reshape([batch, num_key_value_heads * n_rep, slen, head_dim])
}

fn rotate_half(xs: &Tensor) -> Tensor {
    let last_dim = *xs.size().last().unwrap();
    let xs1 = xs.narrow(-1, 0, last_dim / 2);
    let xs2 = xs.narrow(-1, last_dim / 2, last_dim - last_dim / 2);
    Tensor::cat(&[&xs2.neg(), &xs1], -1)
}

fn linear(vs: nn::Path, in_dim: usize, out_dim: usize) -> nn::Linear {
    nn::linear(
        vs,
        in_dim as i64,
        out_dim as i64,
        nn::LinearConfig {
            bias: false,
            ..Default::default()
        },
    )
}

#[derive(Debug)]
struct RmsNorm {
    weight: Tensor,
    eps: f64,
}

impl RmsNorm {
    fn new(vs: nn::Path, size: usize, eps: f64) -> Self {
        let weight = vs.ones("weight", &[size as i64]);
        Self { weight, eps }
    }
}

impl Module for RmsNorm {
    fn forward(&self, xs: &Tensor) -> Tensor {
        let kind = xs.kind();
        let xs = xs.to_kind(Kind::Float);
        let variance = xs.pow_tensor_scalar(2).mean_dim(-1, true, Kind::Float);
        let xs_normed = (xs * (variance + self.eps).rsqrt()).to_kind(kind);
        &self.weight * xs_normed
    }
}

#[derive(Debug)]
struct Mlp {
    gate_proj: nn::Linear,
    up_proj: nn::Linear,
    down_proj: nn::Linear,
}

impl Mlp {
    fn new(vs: nn::Path, config: &Config) -> Self {
        Self {
            gate_proj: linear(&vs / "gate_proj", config.hidden_size, config.intermediate_size),
            up_proj: linear(&vs / "up_proj", config.hidden_size, config.intermediate_size),
            down_proj: linear(&vs / "down_proj", config.intermediate_size, config.hidden_size),
        }
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Tensor {
        self.down_proj
            .forward(&(self.gate_proj.forward(xs).silu() * self.up_proj.forward(xs)))
    }
}

#[derive(Debug)]
struct CausalSelfAttention {
    q_proj: nn::Linear,
    k_proj: nn::Linear,
    v_proj: nn::Linear,
    o_proj: nn::Linear,
    n_head: i64,
    n_kvhead: i64,
    head_dim: i64,
    device: Device,
    use_sdpa: bool,
}

impl CausalSelfAttention {
    fn new(vs: nn::Path, config: &Config) -> Self {
        let head_dim = config.hidden_size / config.num_attention_heads;
        let size_q = head_dim * config.num_attention_heads;
        let size_kv = head_dim * config.num_key_value_heads;
        Self {
            q_proj: linear(&vs / "q_proj", config.hidden_size, size_q),
            k_proj: linear(&vs / "k_proj", config.hidden_size, size_kv),
            v_proj: linear(&vs / "v_proj", config.hidden_size, size_kv),
            o_proj: linear(&vs / "o_proj", size_q, config.hidden_size),
            n_head: config.num_attention_heads as i64,
            n_kvhead: config.num_key_value_heads as i64,
            head_dim: head_dim as i64,
            device: vs.device(),
            use_sdpa: config.use_sdpa,
        }
    }

    fn forward(&self, x: &Tensor, rope: &RotaryEmbedding) -> Tensor {
        let (b, t, _) = x.size3().unwrap();
        let kind = x.kind();

        let split_heads = |x: Tensor, heads: i64| {
            x.contiguous()
                .reshape([b, t, heads, self.head_dim])
                .transpose(1, 2)
        };
        let q = split_heads(self.q_proj.forward(x), self.n_head);
        let k = split_heads(self.k_proj.forward(x), self.n_kvhead);
        let v = split_heads(self.v_proj.forward(x), self.n_kvhead);

        let q = rope.apply(&q).to_kind(kind);
        let k = rope.apply(&k).to_kind(kind);

        let k = repeat_kv(&k, self.n_head / self.n_kvhead);
        let v = repeat_kv(&v, self.n_head / self.n_kvhead);

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let y = if self.use_sdpa {
            Tensor::scaled_dot_product_attention::<Tensor>(
                &q,
                &k,
                &v,
                None,
                0.0,
                t > 1,
                Some(scale),
            )
        } else {
            let att = q.matmul(&k.transpose(-2, -1)) * scale;
            let mask = Tensor::ones([t, t], (kind, self.device))
                .tril(0)
                .reshape([1, 1, t, t]);
            let att = att.masked_fill(&mask.eq(0.), f64::NEG_INFINITY);
            att.softmax(-1, kind).matmul(&v)
        };
        let y = y
            .transpose(1, 2)
            .contiguous()
            .reshape([b, t, self.n_head * self.head_dim]);
        self.o_proj.forward(&y)
    }
}

#[derive(Debug)]
struct Block {
    input_layernorm: RmsNorm,
    attn: CausalSelfAttention,
    post_attention_layernorm: RmsNorm,
    mlp: Mlp,
}

impl Block {
    fn new(vs: nn::Path, config: &Config) -> Self {
        Self {
            input_layernorm: RmsNorm::new(
                &vs / "input_layernorm",
                config.hidden_size,
                config.rms_norm_eps,
            ),
            attn: CausalSelfAttention::new(&vs / "self_attn", config),
            post_attention_layernorm: RmsNorm::new(
                &vs / "post_attention_layernorm",
                config.hidden_size,
                config.rms_norm_eps,
            ),
            mlp: Mlp::new(&vs / "mlp", config),
        }
    }

    fn forward(&self, x: &Tensor, rope: &RotaryEmbedding) -> Tensor {
        let x = self.attn.forward(&self.input_layernorm.forward(x), rope) + x;
        self.mlp.forward(&self.post_attention_layernorm.forward(&x)) + x
    }
}

/// The decoder stack of a Llama model, without the language modelling head.
#[derive(Debug)]
pub struct Llama {
    embed_tokens: nn::Embedding,
    blocks: Vec<Block>,
    norm: RmsNorm,
}

impl Llama {
    pub fn new(vs: nn::Path, config: &Config) -> Self {
        let embed_tokens = nn::embedding(
            &vs / "model" / "embed_tokens",
            config.vocab_size as i64,
            config.hidden_size as i64,
            Default::default(),
        );
        let norm = RmsNorm::new(
            &vs / "model" / "norm",
            config.hidden_size,
            config.rms_norm_eps,
        );
        let blocks = (0..config.num_hidden_layers)
            .map(|i| Block::new(&vs / "model" / "layers" / i, config))
            .collect::<Vec<_>>();
        Self {
            embed_tokens,
            blocks,
            norm,
        }
    }

    /// Hidden states for every position of `x`, starting at position 0.
    pub fn forward(&self, x: &Tensor, rope: &RotaryEmbedding) -> Tensor {
        let mut x = self.embed_tokens.forward(x);
        for block in &self.blocks {
            x = block.forward(&x, rope);
        }
        self.norm.forward(&x)
    }

    pub fn embedding_weight(&self) -> &Tensor {
        &self.embed_tokens.ws
    }
}
