use qvrag_core::filter::RecordFilter;
use qvrag_core::{Chunk, Error, Metadata};
use serde_json::json;

fn meta(v: serde_json::Value) -> Metadata {
    v.as_object().cloned().unwrap_or_default()
}

#[test]
fn chroma_style_filter_over_chunks() {
    let docs = [
        ("Install with pip.", meta(json!({"source": "guide.md", "page": 1, "tags": "setup"}))),
        ("Configure the server.", meta(json!({"source": "guide.md", "page": 2}))),
        ("Release notes.", meta(json!({"source": "notes.txt", "page": 1}))),
    ];
    let filter = RecordFilter::parse(
        Some(&json!({"$and": [{"source": "guide.md"}, {"page": {"$lte": 2}}]})),
        Some(&json!({"$not_contains": "pip"})),
    )
    .unwrap();
    let kept: Vec<&str> = docs.iter().filter(|(t, m)| filter.matches(t, m)).map(|(t, _)| *t).collect();
    assert_eq!(kept, ["Configure the server."]);
}

#[test]
fn empty_filters_match_everything() {
    let filter = RecordFilter::parse(None, None).unwrap();
    assert!(filter.is_empty());
    assert!(filter.matches("anything", &Metadata::new()));
}

#[test]
fn filter_errors_name_the_problem() {
    let err = RecordFilter::parse(Some(&json!({"$or": "nope"})), None).unwrap_err();
    assert!(matches!(err, Error::InvalidFilter(_)));
    assert!(err.to_string().starts_with("Invalid filter:"));
}

#[test]
fn document_metadata_wins_over_chunk_metadata() {
    let mut chunk = Chunk::with_metadata("body", meta(json!({"Header 1": "Intro", "source": "chunk"})));
    chunk.inherit(&meta(json!({"source": "doc.md", "file_type": "md"})));
    assert_eq!(chunk.metadata["source"], json!("doc.md"));
    assert_eq!(chunk.metadata["Header 1"], json!("Intro"));
    assert_eq!(chunk.metadata.len(), 3);
}
