use std::{fs::File, path::Path, sync::Arc};

use lmeval::{Document, DocumentSource, EvalError, Letter, MMLU};
use lmeval_data_provider::Split;
use parquet::{
    data_type::{ByteArray, ByteArrayType, Int32Type, Int64Type},
    file::{properties::WriterProperties, writer::SerializedFileWriter},
    schema::parser::parse_message_type,
};
use pretty_assertions::assert_eq;

const CHOICES: [&str; 4] = ["red", "green", "blue", "yellow"];

enum Answers {
    Long(Vec<i64>),
    Int(Vec<i32>),
    Letter(Vec<&'static str>),
}

/// Writes `{dir}/{subject}/test/0000.parquet` with the columns of the hub's MMLU conversion.
fn write_subject(dir: &Path, subject: &str, rows: &[(&str, &[&str])], answers: Answers) {
    let answer_type = match &answers {
        Answers::Long(_) => "REQUIRED INT64 answer;",
        Answers::Int(_) => "REQUIRED INT32 answer;",
        Answers::Letter(_) => "REQUIRED BYTE_ARRAY answer (UTF8);",
    };
    let schema = format!(
        "message mmlu {{
            REQUIRED BYTE_ARRAY question (UTF8);
            REQUIRED group choices (LIST) {{
                REPEATED group list {{
                    REQUIRED BYTE_ARRAY element (UTF8);
                }}
            }}
            {answer_type}
        }}"
    );
    let schema = Arc::new(parse_message_type(&schema).unwrap());
    let split_dir = dir.join(subject).join("test");
    std::fs::create_dir_all(&split_dir).unwrap();
    let file = File::create(split_dir.join("0000.parquet")).unwrap();
    let mut writer =
        SerializedFileWriter::new(file, schema, Arc::new(WriterProperties::builder().build()))
            .unwrap();
    let mut row_group = writer.next_row_group().unwrap();

    let questions: Vec<ByteArray> = rows.iter().map(|(q, _)| ByteArray::from(*q)).collect();
    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<ByteArrayType>()
        .write_batch(&questions, None, None)
        .unwrap();
    column.close().unwrap();

    let mut choices = Vec::new();
    let mut def_levels: Vec<i16> = Vec::new();
    let mut rep_levels: Vec<i16> = Vec::new();
    for (_, options) in rows {
        for (i, option) in options.iter().enumerate() {
            choices.push(ByteArray::from(*option));
            def_levels.push(1);
            rep_levels.push(if i == 0 { 0 } else { 1 });
        }
    }
    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<ByteArrayType>()
        .write_batch(&choices, Some(def_levels.as_slice()), Some(rep_levels.as_slice()))
        .unwrap();
    column.close().unwrap();

    let mut column = row_group.next_column().unwrap().unwrap();
    match answers {
        Answers::Long(values) => column
            .typed::<Int64Type>()
            .write_batch(&values, None, None)
            .unwrap(),
        Answers::Int(values) => column
            .typed::<Int32Type>()
            .write_batch(&values, None, None)
            .unwrap(),
        Answers::Letter(values) => {
            let values: Vec<ByteArray> = values.into_iter().map(ByteArray::from).collect();
            column
                .typed::<ByteArrayType>()
                .write_batch(&values, None, None)
                .unwrap()
        }
    };
    column.close().unwrap();

    row_group.close().unwrap();
    writer.close().unwrap();
}

fn malformed_row(source: &MMLU, subject: &str) -> (String, usize, String) {
    let err = source.documents(subject, Split::Test).err().unwrap();
    match err.downcast_ref::<EvalError>() {
        Some(EvalError::MalformedRow {
            subject,
            row,
            reason,
        }) => (subject.clone(), *row, reason.clone()),
        _ => panic!("expected a malformed row error, got {err:?}"),
    }
}

#[test]
fn reads_questions_and_rejects_malformed_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_subject(
        dir.path(),
        "anatomy",
        &[("Which is warm?", &CHOICES[..]), ("Which is a fruit colour?", &CHOICES[..])],
        Answers::Long(vec![0, 3]),
    );
    write_subject(
        dir.path(),
        "virology",
        &[("Which is the sky?", &CHOICES[..])],
        Answers::Letter(vec!["C"]),
    );
    write_subject(
        dir.path(),
        "astronomy",
        &[("Which is grass?", &CHOICES[..])],
        Answers::Int(vec![1]),
    );
    write_subject(
        dir.path(),
        "sociology",
        &[
            ("Which is warm?", &CHOICES[..]),
            ("Which is cold?", &CHOICES[..3]),
        ],
        Answers::Long(vec![0, 2]),
    );
    write_subject(
        dir.path(),
        "philosophy",
        &[("Which is warm?", &CHOICES[..])],
        Answers::Long(vec![7]),
    );
    let source = MMLU::from_directory(dir.path()).unwrap();

    assert_eq!(
        source.documents("anatomy", Split::Test).unwrap(),
        vec![
            Document::new("Which is warm?", CHOICES, Letter::A),
            Document::new("Which is a fruit colour?", CHOICES, Letter::D),
        ]
    );
    assert_eq!(
        source.documents("virology", Split::Test).unwrap()[0].answer,
        Letter::C
    );
    assert_eq!(
        source.documents("astronomy", Split::Test).unwrap()[0].answer,
        Letter::B
    );

    let (subject, row, reason) = malformed_row(&source, "sociology");
    assert_eq!((subject.as_str(), row), ("sociology", 1));
    assert!(reason.contains("expected 4 choices, found 3"), "{reason}");

    let (subject, row, _) = malformed_row(&source, "philosophy");
    assert_eq!((subject.as_str(), row), ("philosophy", 0));

    // no dev split was written
    assert!(source.documents("anatomy", Split::Dev).is_err());
}
