use crate::{Document, EvalError, Letter};
use lmeval_modeling::encode_ids;
use tokenizers::Tokenizer;
use tracing::debug;

/// `"high_school_us_history"` -> `"high school us history"`
pub fn format_subject(subject: &str) -> String {
    subject
        .split('_')
        .filter(|x| !x.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn header(subject: &str) -> String {
    format!(
        "The following are multiple choice questions (with answers) about {}.\n\n",
        format_subject(subject)
    )
}

/// Renders a question and its lettered choices, ending in `Answer:`. Worked examples
/// carry their answer and a blank line.
pub fn format_example(doc: &Document, include_answer: bool) -> String {
    let mut prompt = doc.question.clone();
    for (letter, choice) in Letter::ALL.iter().zip(&doc.choices) {
        prompt.push_str(&format!("\n{letter}. {choice}"));
    }
    prompt.push_str("\nAnswer:");
    if include_answer {
        prompt.push_str(&format!(" {}\n\n", doc.answer));
    }
    prompt
}

pub fn format_prompt(subject: &str, shots: &[Document], doc: &Document) -> String {
    let mut prompt = header(subject);
    for shot in shots {
        prompt.push_str(&format_example(shot, true));
    }
    prompt.push_str(&format_example(doc, false));
    prompt
}

/// A tokenized prompt and how many worked examples made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedPrompt {
    pub tokens: Vec<i64>,
    pub num_fewshot: usize,
    pub truncated: bool,
}

/// Tokenizes the prompt for `doc`, dropping worked examples from the end of `shots` until it
/// fits in `budget` tokens. A zero-shot prompt that still doesn't fit keeps its BOS token and
/// the tail of the prompt.
pub fn fit_prompt(
    tokenizer: &Tokenizer,
    bos_token_id: Option<i64>,
    subject: &str,
    shots: &[Document],
    doc: &Document,
    budget: Option<usize>,
) -> Result<FittedPrompt, EvalError> {
    let mut num_fewshot = shots.len();
    loop {
        let prompt = format_prompt(subject, &shots[..num_fewshot], doc);
        let mut tokens: Vec<i64> = bos_token_id.into_iter().collect();
        tokens.extend(encode_ids(tokenizer, &prompt)?);
        match budget {
            Some(budget) if tokens.len() > budget && num_fewshot > 0 => {
                debug!(
                    "{} tokens exceed budget of {budget} with {num_fewshot} shots",
                    tokens.len()
                );
                num_fewshot -= 1;
            }
            Some(budget) if tokens.len() > budget => {
                // BOS stays at the front
                let start = match bos_token_id {
                    Some(_) if budget > 0 => 1,
                    _ => 0,
                };
                tokens.drain(start..start + tokens.len() - budget);
                return Ok(FittedPrompt {
                    tokens,
                    num_fewshot,
                    truncated: true,
                });
            }
            _ => {
                return Ok(FittedPrompt {
                    tokens,
                    num_fewshot,
                    truncated: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(question: &str, answer: Letter) -> Document {
        Document::new(question, ["1", "2", "3", "4"], answer)
    }

    #[test]
    fn test_format_subject() {
        assert_eq!(format_subject("abstract_algebra"), "abstract algebra");
        assert_eq!(format_subject("anatomy"), "anatomy");
    }

    #[test]
    fn test_format_example() {
        let doc = doc("What is 1 + 1?", Letter::B);
        assert_eq!(
            format_example(&doc, false),
            "What is 1 + 1?\nA. 1\nB. 2\nC. 3\nD. 4\nAnswer:"
        );
        assert_eq!(
            format_example(&doc, true),
            "What is 1 + 1?\nA. 1\nB. 2\nC. 3\nD. 4\nAnswer: B\n\n"
        );
    }

    #[test]
    fn test_format_prompt() {
        let shots = [doc("What is 1 + 1?", Letter::B)];
        let prompt = format_prompt("elementary_mathematics", &shots, &doc("What is 2 + 2?", Letter::D));
        assert_eq!(
            prompt,
            "The following are multiple choice questions (with answers) about elementary mathematics.\n\n\
             What is 1 + 1?\nA. 1\nB. 2\nC. 3\nD. 4\nAnswer: B\n\n\
             What is 2 + 2?\nA. 1\nB. 2\nC. 3\nD. 4\nAnswer:"
        );
    }
}
