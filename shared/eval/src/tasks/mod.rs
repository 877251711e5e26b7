mod mmlu;

pub use mmlu::MMLU;
