use anyhow::{anyhow, bail, Result};
use parquet::{
    errors::ParquetError,
    file::reader::{FileReader, SerializedFileReader},
    record::reader::RowIter,
};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    fs::File,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

pub type Row = parquet::record::Row;

const SPLITS: [Split; 4] = [Split::Train, Split::Dev, Split::Validation, Split::Test];

fn looks_like_parquet_file(x: &Path) -> bool {
    x.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Dev,
    Validation,
    Test,
}

impl Display for Split {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Split::Train => "train",
                Split::Dev => "dev",
                Split::Validation => "validation",
                Split::Test => "test",
            }
        )
    }
}

impl FromStr for Split {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        SPLITS
            .into_iter()
            .find(|split| s.eq_ignore_ascii_case(&split.to_string()))
            .ok_or_else(|| anyhow!("Unknown split {s}"))
    }
}

fn split_prefix(name: &str) -> Option<Split> {
    name.split('-').next()?.parse().ok()
}

/// Works out the (subset, split) a parquet file belongs to. Understands both the hub's
/// parquet conversion layout, `{subset}/{split}/0000.parquet`, and the ad-hoc layout,
/// `{subset}/{split}-00000-of-00001.parquet`.
fn locate(file: &Path) -> Option<(Option<String>, Split)> {
    let stem = file.file_stem()?.to_string_lossy();
    let mut ancestors = file.iter().rev().skip(1);
    let parent = ancestors.next().map(|x| x.to_string_lossy().into_owned());
    let grandparent = ancestors.next().map(|x| x.to_string_lossy().into_owned());

    if let Some(split) = parent.as_deref().and_then(split_prefix) {
        return Some((grandparent, split));
    }
    split_prefix(&stem).map(|split| (parent, split))
}

pub struct Dataset {
    files: Vec<SerializedFileReader<File>>,
    column_ids: HashMap<String, usize>,
}

impl Dataset {
    /// Opens every parquet file in `repo_files` that belongs to `split` and `subset`.
    /// Without an explicit split, the split of the first matching file is used.
    pub fn load_dataset(
        repo_files: &[PathBuf],
        split: Option<Split>,
        subset: Option<&str>,
    ) -> Result<Self> {
        let mut split = split;
        let mut to_load: Vec<PathBuf> = Vec::new();
        for file in repo_files.iter().filter(|x| looks_like_parquet_file(x)) {
            let Some((file_subset, file_split)) = locate(file) else {
                continue;
            };
            if let Some(subset) = subset {
                if file_subset.as_deref() != Some(subset) {
                    continue;
                }
            }
            match split {
                Some(split) if split != file_split => continue,
                Some(_) => {}
                None => split = Some(file_split),
            }
            to_load.push(file.clone());
        }
        let split = match (split, to_load.is_empty()) {
            (Some(split), false) => split,
            (Some(split), true) => bail!(
                "No {split} files in dataset{}",
                subset.map(|x| format!(" for subset {x}")).unwrap_or_default()
            ),
            (None, _) => bail!("Could not determine split"),
        };
        to_load.sort();
        debug!("Loading {split} split from {to_load:?}");

        let files: std::io::Result<Vec<File>> = to_load.into_iter().map(File::open).collect();
        let files: Result<Vec<SerializedFileReader<File>>, ParquetError> =
            files?.into_iter().map(SerializedFileReader::new).collect();
        let files = files?;
        let column_ids = HashMap::from_iter(
            files[0]
                .metadata()
                .file_metadata()
                .schema_descr()
                .root_schema()
                .get_fields()
                .iter()
                .enumerate()
                .map(|(idx, x)| (x.name().to_owned(), idx)),
        );
        Ok(Dataset { files, column_ids })
    }

    pub fn num_rows(&self) -> usize {
        self.files
            .iter()
            .fold(0, |acc, x| acc + x.metadata().file_metadata().num_rows()) as usize
    }

    pub fn iter(&self) -> DatasetIter {
        DatasetIter {
            files_iter: self.files.iter(),
            row_iter: None,
        }
    }

    pub fn get_column_id<T: Into<String>>(&self, name: T) -> Option<usize> {
        self.column_ids.get(&name.into()).copied()
    }
}

pub struct DatasetIter<'a> {
    files_iter: std::slice::Iter<'a, SerializedFileReader<File>>,
    row_iter: Option<RowIter<'a>>,
}

impl Iterator for DatasetIter<'_> {
    type Item = Result<Row, ParquetError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.row_iter.as_mut().and_then(|rows| rows.next()) {
                return Some(row);
            }
            let file = self.files_iter.next()?;
            match file.get_row_iter(None) {
                Ok(rows) => self.row_iter = Some(rows),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
