use anyhow::{anyhow, Result};
use lmeval_data_provider::Split;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

pub const NUM_CHOICES: usize = 4;

/// One of the four answer labels of an MMLU question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    pub const ALL: [Letter; NUM_CHOICES] = [Letter::A, Letter::B, Letter::C, Letter::D];

    pub fn from_index(index: usize) -> Option<Letter> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
        }
    }
}

impl Display for Letter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Letter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|x| s.trim().eq_ignore_ascii_case(x.as_str()))
            .ok_or_else(|| anyhow!("{s:?} is not one of A, B, C, D"))
    }
}

/// A multiple choice question with exactly four choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub question: String,
    pub choices: [String; NUM_CHOICES],
    pub answer: Letter,
}

impl Document {
    pub fn new(question: impl Into<String>, choices: [&str; NUM_CHOICES], answer: Letter) -> Self {
        Self {
            question: question.into(),
            choices: choices.map(|x| x.to_owned()),
            answer,
        }
    }
}

/// Where the questions of a subject come from.
pub trait DocumentSource {
    /// Every question of `subject` in `split`, in dataset order.
    fn documents(&self, subject: &str, split: Split) -> Result<Vec<Document>>;
}

/// Questions held in memory, keyed by subject and split.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    documents: HashMap<(String, Split), Vec<Document>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subject: &str, split: Split, documents: Vec<Document>) -> &mut Self {
        self.documents
            .entry((subject.to_owned(), split))
            .or_default()
            .extend(documents);
        self
    }
}

impl DocumentSource for InMemorySource {
    fn documents(&self, subject: &str, split: Split) -> Result<Vec<Document>> {
        self.documents
            .get(&(subject.to_owned(), split))
            .cloned()
            .ok_or_else(|| anyhow!("No {split} documents for {subject}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_letter_index_round_trip() {
        for (idx, letter) in Letter::ALL.into_iter().enumerate() {
            assert_eq!(letter.index(), idx);
            assert_eq!(Letter::from_index(idx), Some(letter));
        }
        assert_eq!(Letter::from_index(4), None);
    }

    #[test]
    fn test_parse_letter() {
        assert_eq!("c".parse::<Letter>().unwrap(), Letter::C);
        assert_eq!(" D ".parse::<Letter>().unwrap(), Letter::D);
        assert!("E".parse::<Letter>().is_err());
    }

    #[test]
    fn test_in_memory_source() {
        let mut source = InMemorySource::new();
        source.insert(
            "anatomy",
            Split::Test,
            vec![Document::new("Q?", ["a", "b", "c", "d"], Letter::B)],
        );
        assert_eq!(source.documents("anatomy", Split::Test).unwrap().len(), 1);
        assert!(source.documents("anatomy", Split::Dev).is_err());
    }
}
