use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use lmeval::{
    evaluate_subject, resolve_subjects, Benchmark, EvalOptions, EvaluationReport, LabelTokens,
    ALL_BENCHMARK_NAMES, MMLU,
};
use lmeval_data_provider::{download_model_repo_sync, local_repo_files};
use lmeval_modeling::{auto_tokenizer, AttentionImplementation, LlamaForCausalLM};
use std::path::{Path, PathBuf};
use tch::{Device, Kind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Dtype {
    Bf16,
    F16,
    F32,
}

impl From<Dtype> for Kind {
    fn from(value: Dtype) -> Self {
        match value {
            Dtype::Bf16 => Kind::BFloat16,
            Dtype::F16 => Kind::Half,
            Dtype::F32 => Kind::Float,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Few-shot multiple choice evaluation of causal language models")]
struct Args {
    /// Benchmark to run
    #[arg(value_parser = ALL_BENCHMARK_NAMES)]
    benchmark: String,

    /// Hub model id, or a local directory holding config.json, tokenizer.json and safetensors
    #[arg(long, default_value = "NousResearch/Llama-2-7b-hf")]
    model: String,

    #[arg(long, default_value_t = 5)]
    num_fewshot: usize,

    /// Comma separated subjects; all 57 when omitted
    #[arg(long)]
    subjects: Option<String>,

    #[arg(long, default_value = MMLU::DEFAULT_REPO)]
    dataset: String,

    #[arg(long)]
    revision: Option<String>,

    /// Read the dataset's parquet files from this directory instead of the hub
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Grade at most this many test questions per subject
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, default_value_t = 2048)]
    max_context_len: usize,

    #[arg(long, value_enum, default_value_t = Dtype::Bf16)]
    dtype: Dtype,

    /// `cpu`, `cuda` or `cuda:N`; CUDA when available otherwise
    #[arg(long)]
    device: Option<String>,

    #[arg(long, default_value_t = false)]
    eager_attention: bool,

    /// Shuffle the dev split with this seed before picking worked examples
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// Also write every prediction to a JSON file next to the score
    #[arg(long, default_value_t = false)]
    save_predictions: bool,

    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn parse_device(device: Option<&str>) -> Result<Device> {
    Ok(match device.map(|x| x.to_lowercase()).as_deref() {
        None => Device::cuda_if_available(),
        Some("cpu") => Device::Cpu,
        Some("cuda") => Device::Cuda(0),
        Some(other) => match other.strip_prefix("cuda:").map(str::parse::<usize>) {
            Some(Ok(index)) => Device::Cuda(index),
            _ => bail!("Unknown device {other}"),
        },
    })
}

fn model_repo_files(model: &str) -> Result<Vec<PathBuf>> {
    if Path::new(model).is_dir() {
        local_repo_files(model)
    } else {
        Ok(download_model_repo_sync(model, None, None, None, true)?)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let benchmark = Benchmark::from_name(&args.benchmark)?;
    let requested = args
        .subjects
        .as_deref()
        .map(|x| {
            x.split(',')
                .map(|x| x.trim().to_owned())
                .filter(|x| !x.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let subjects = resolve_subjects(&requested)?;
    let source = match &args.data_dir {
        Some(dir) => MMLU::from_directory(dir)?,
        None => MMLU::from_hub(&args.dataset, args.revision.clone(), &subjects, !args.quiet)?,
    };

    let _no_grad = tch::no_grad_guard();
    let device = parse_device(args.device.as_deref())?;
    let repo_files = model_repo_files(&args.model)?;
    let tokenizer = auto_tokenizer(&repo_files)?;
    let labels = LabelTokens::from_tokenizer(&tokenizer)?;
    let mut model = LlamaForCausalLM::from_pretrained(
        &repo_files,
        Some(args.dtype.into()),
        Some(match args.eager_attention {
            true => AttentionImplementation::Eager,
            false => AttentionImplementation::Sdpa,
        }),
        Some(device),
    )?;

    let options = EvalOptions {
        num_fewshot: args.num_fewshot,
        max_context_len: Some(args.max_context_len),
        limit: args.limit,
        seed: args.seed,
    };
    info!(
        "Evaluating {} on {} {} subjects, {}-shot",
        args.model,
        subjects.len(),
        MMLU::name(),
        options.num_fewshot
    );

    let mut results = Vec::with_capacity(subjects.len());
    for subject in &subjects {
        let result = evaluate_subject(
            &source,
            subject,
            &mut model,
            &tokenizer,
            &labels,
            &options,
            !args.quiet,
        )?;
        println!("Average accuracy {:.3} - {}", result.accuracy, subject);
        results.push(result);
    }

    let report = EvaluationReport::new(benchmark, &args.model, args.num_fewshot, results);
    for (subcategory, accuracy) in report.subcategory_accuracies() {
        println!("Average accuracy {accuracy:.3} - {subcategory}");
    }
    for (category, accuracy) in report.category_accuracies() {
        println!("Average accuracy {accuracy:.3} - {category}");
    }
    println!("Weighted accuracy: {:.3}", report.weighted_accuracy());
    println!("Average accuracy: {:.3}", report.overall());

    let path = report.write_score(&args.output_dir)?;
    info!("Wrote score to {}", path.display());
    if args.save_predictions {
        let path = report.write_json(&args.output_dir)?;
        info!("Wrote predictions to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(parse_device(Some("cpu")).unwrap(), Device::Cpu);
        assert_eq!(parse_device(Some("CUDA")).unwrap(), Device::Cuda(0));
        assert_eq!(parse_device(Some("cuda:1")).unwrap(), Device::Cuda(1));
        assert!(parse_device(Some("tpu")).is_err());
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["lmeval", "mmlu", "--num-fewshot", "0", "--subjects", "anatomy,virology"])
            .unwrap();
        assert_eq!(args.num_fewshot, 0);
        assert_eq!(args.subjects.as_deref(), Some("anatomy,virology"));
        assert!(Args::try_parse_from(["lmeval", "hellaswag"]).is_err());
    }
}
