use hf_hub::{
    api::sync::{ApiBuilder, ApiError},
    api::Siblings,
    Cache, Repo, RepoType,
};
use std::path::PathBuf;
use tracing::{debug, info};

const MODEL_EXTENSIONS: [&str; 2] = [".safetensors", ".json"];
const DATASET_EXTENSIONS: [&str; 1] = [".parquet"];

/// Revision of a dataset repo that holds the hub's automatic parquet conversion.
pub const PARQUET_CONVERSION_REVISION: &str = "refs/convert/parquet";

fn check_extensions(sibling: &Siblings, extensions: &[&'static str]) -> bool {
    match extensions.is_empty() {
        true => true,
        false => extensions
            .iter()
            .any(|ext| sibling.rfilename.ends_with(ext)),
    }
}

/// Dataset repos keep one top-level directory per subset; only fetch the ones asked for.
fn check_subsets(sibling: &Siblings, subsets: Option<&[String]>) -> bool {
    match subsets {
        None => true,
        Some(subsets) => match sibling.rfilename.split('/').next() {
            Some(top) => subsets.iter().any(|subset| subset == top),
            None => false,
        },
    }
}

fn download_repo_sync(
    repo: Repo,
    cache: Option<PathBuf>,
    token: Option<String>,
    progress_bar: bool,
    extensions: &[&'static str],
    subsets: Option<&[String]>,
) -> Result<Vec<PathBuf>, ApiError> {
    let cache = match cache {
        Some(cache) => Cache::new(cache),
        None => Cache::default(),
    };
    let api = ApiBuilder::new()
        .with_cache_dir(cache.path().clone())
        .with_token(token.or(cache.token()))
        .with_progress(progress_bar)
        .build()?
        .repo(repo);
    let siblings = api
        .info()?
        .siblings
        .into_iter()
        .filter(|x| check_extensions(x, extensions) && check_subsets(x, subsets))
        .collect::<Vec<_>>();
    info!("Fetching {} files", siblings.len());
    siblings
        .iter()
        .map(|x| {
            debug!("Fetching {}", x.rfilename);
            api.get(&x.rfilename)
        })
        .collect()
}

pub fn download_model_repo_sync(
    repo_id: &str,
    revision: Option<String>,
    cache: Option<PathBuf>,
    token: Option<String>,
    progress_bar: bool,
) -> Result<Vec<PathBuf>, ApiError> {
    download_repo_sync(
        match revision {
            Some(revision) => Repo::with_revision(repo_id.to_owned(), RepoType::Model, revision),
            None => Repo::model(repo_id.to_owned()),
        },
        cache,
        token,
        progress_bar,
        &MODEL_EXTENSIONS,
        None,
    )
}

/// Downloads the parquet files of a dataset repo. `subsets` restricts the download to the
/// named top-level directories; without it every parquet file is fetched.
pub fn download_dataset_repo_sync(
    repo_id: &str,
    revision: Option<String>,
    subsets: Option<&[String]>,
    cache: Option<PathBuf>,
    token: Option<String>,
    progress_bar: bool,
) -> Result<Vec<PathBuf>, ApiError> {
    download_repo_sync(
        Repo::with_revision(
            repo_id.to_owned(),
            RepoType::Dataset,
            revision.unwrap_or(PARQUET_CONVERSION_REVISION.to_owned()),
        ),
        cache,
        token,
        progress_bar,
        &DATASET_EXTENSIONS,
        subsets,
    )
}
