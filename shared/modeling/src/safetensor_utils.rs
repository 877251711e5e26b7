use safetensors::{Dtype, SafeTensors};
use std::{collections::HashSet, io, path::PathBuf};
use tch::{nn::VarStore, Kind, Tensor};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadSafetensorsError {
    #[error("Failed to open safetensors file: {0}")]
    OpenFile(#[from] io::Error),

    #[error("Failed to deserialize safetensors: {0}")]
    Deserialize(#[from] safetensors::SafeTensorError),

    #[error("failed to perform tensor operation: {0}")]
    TchError(#[from] tch::TchError),

    #[error("Tensor {name} has unsupported dtype {dtype:?}")]
    UnsupportedDtype { name: String, dtype: Dtype },

    #[error("No safetensors files found")]
    NoFiles,

    #[error("Checkpoint missing the following variables: {0:?}")]
    MissingVariables(HashSet<String>),
}

fn kind_of(dtype: Dtype) -> Option<Kind> {
    Some(match dtype {
        Dtype::BOOL => Kind::Bool,
        Dtype::U8 => Kind::Uint8,
        Dtype::I8 => Kind::Int8,
        Dtype::I16 => Kind::Int16,
        Dtype::I32 => Kind::Int,
        Dtype::I64 => Kind::Int64,
        Dtype::F16 => Kind::Half,
        Dtype::BF16 => Kind::BFloat16,
        Dtype::F32 => Kind::Float,
        Dtype::F64 => Kind::Double,
        _ => return None,
    })
}

/// Copies every variable of `vs` from the safetensors files in `repo_files`, converting to the
/// variable's kind and device. Tensors in the files without a matching variable are ignored.
pub fn load_safetensors_into_variables(
    vs: &mut VarStore,
    repo_files: &[PathBuf],
) -> Result<(), LoadSafetensorsError> {
    let _no_grad = tch::no_grad_guard();
    let paths = repo_files
        .iter()
        .filter(|x| {
            x.extension()
                .is_some_and(|y| y.eq_ignore_ascii_case("safetensors"))
        })
        .collect::<Vec<_>>();
    if paths.is_empty() {
        return Err(LoadSafetensorsError::NoFiles);
    }
    // shallow clones that share storage with the store's variables
    let mut variables = vs.variables();
    let mut unmatched = variables.keys().cloned().collect::<HashSet<_>>();
    for path in paths {
        debug!("Loading weights from {}", path.display());
        let file = std::fs::File::open(path)?;
        let content = unsafe { memmap2::MmapOptions::new().map(&file)? };
        let safetensors = SafeTensors::deserialize(&content)?;
        for (name, var) in variables.iter_mut() {
            let Ok(view) = safetensors.tensor(name) else {
                continue;
            };
            let kind = kind_of(view.dtype()).ok_or_else(|| LoadSafetensorsError::UnsupportedDtype {
                name: name.clone(),
                dtype: view.dtype(),
            })?;
            let size: Vec<i64> = view.shape().iter().map(|&x| x as i64).collect();
            let src_tensor = Tensor::f_from_data_size(view.data(), &size, kind)?;
            var.f_copy_(&src_tensor)?;
            unmatched.remove(name);
        }
    }
    if !unmatched.is_empty() {
        return Err(LoadSafetensorsError::MissingVariables(unmatched));
    }
    Ok(())
}
