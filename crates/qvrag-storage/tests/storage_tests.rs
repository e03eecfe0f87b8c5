use qvrag_core::{Error, Metadata};
use qvrag_embed::HashEmbedder;
use qvrag_storage::LanceStorage;
use serde_json::json;

fn meta(v: serde_json::Value) -> Metadata {
    v.as_object().cloned().unwrap_or_default()
}

async fn open_tmp(dir: &std::path::Path, name: &str) -> anyhow::Result<LanceStorage> {
    Ok(LanceStorage::open(name, Some(dir), Box::new(HashEmbedder::new(256))).await?)
}

const DOCS: [&str; 4] = [
    "Python is a programming language used for scripting and data science.",
    "Rust is a systems programming language focused on safety.",
    "The cat sat on the warm windowsill all afternoon.",
    "Bread dough needs time to rise before baking.",
];

#[tokio::test]
async fn empty_collection_query_returns_nothing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "empty").await?;
    assert_eq!(store.count().await?, 0);
    assert!(store.query("anything", 5, None, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn add_and_query_ranks_by_distance() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "docs").await?;
    let ids = store.add_texts(&DOCS, None, None).await?;
    assert_eq!(ids.len(), 4);
    assert_eq!(store.count().await?, 4);

    let hits = store.query("python scripting data science", 2, None, None).await?;
    assert_eq!(hits.len(), 2);
    assert!(hits[0].text.contains("Python"));
    let (d0, d1) = (hits[0].distance.unwrap(), hits[1].distance.unwrap());
    assert!(d0 <= d1);

    assert!(store.query("python", 0, None, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn readding_identical_chunks_does_not_duplicate() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "dedup").await?;
    let first = store.add_texts(&DOCS, None, None).await?;
    let second = store.add_texts(&DOCS, None, None).await?;
    assert_eq!(first, second);
    assert_eq!(store.count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn empty_input_is_noop() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "noop").await?;
    let none: [&str; 0] = [];
    assert!(store.add_texts(&none, None, None).await?.is_empty());
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn short_metadata_is_padded_and_ids_must_match() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "pad").await?;
    let metas = [meta(json!({"lang": "python"}))];
    let ids = store.add_texts(&DOCS[..2], Some(&metas[..]), None).await?;
    let rows = store.get(&ids).await?;
    assert_eq!(rows[0].metadata["lang"], json!("python"));
    assert!(rows[1].metadata.is_empty());

    let bad_ids = vec!["only-one".to_string()];
    let err = store.add_texts(&DOCS[..2], None, Some(&bad_ids[..])).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    Ok(())
}

#[tokio::test]
async fn filters_apply_to_query_and_delete() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "filtered").await?;
    let metas = [
        meta(json!({"topic": "code", "year": 2020})),
        meta(json!({"topic": "code", "year": 2015})),
        meta(json!({"topic": "pets", "year": 2020})),
        meta(json!({"topic": "food", "year": 2021})),
    ];
    store.add_texts(&DOCS, Some(&metas[..]), None).await?;

    let hits = store.query("language", 5, Some(&json!({"topic": "code"})), None).await?;
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.metadata["topic"] == json!("code")));

    let hits = store
        .query("language", 5, Some(&json!({"year": {"$gte": 2020}})), Some(&json!({"$contains": "cat"})))
        .await?;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.contains("cat"));

    let bad = store.query("x", 5, Some(&json!({"year": {"$between": [1, 2]}})), None).await;
    assert!(matches!(bad, Err(Error::InvalidFilter(_))));

    assert_eq!(store.delete(None, None).await?, 0);
    assert_eq!(store.delete(Some(&json!({"topic": {"$in": ["pets", "food"]}})), None).await?, 2);
    assert_eq!(store.count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn update_replaces_text_and_metadata() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "upd").await?;
    let ids = store.add_texts(&DOCS[..2], None, None).await?;

    let new_text = vec!["Completely different words about gardening.".to_string()];
    let new_meta = vec![meta(json!({"edited": true}))];
    store.update(&ids[..1], Some(&new_text[..]), Some(&new_meta[..])).await?;
    let row = &store.get(&ids[..1]).await?[0];
    assert_eq!(row.text, new_text[0]);
    assert_eq!(row.metadata["edited"], json!(true));
    assert_eq!(store.count().await?, 2);

    let hits = store.query("gardening", 1, None, None).await?;
    assert_eq!(hits[0].id, ids[0]);

    let missing = vec!["nope".to_string()];
    assert!(matches!(store.update(&missing, None, Some(&new_meta[..])).await, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn persisted_collection_reopens_and_checks_dimension() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    {
        let store = open_tmp(tmp.path(), "persist").await?;
        store.add_texts(&DOCS, None, None).await?;
    }
    let reopened = open_tmp(tmp.path(), "persist").await?;
    assert_eq!(reopened.info().await?.count, 4);
    assert_eq!(reopened.info().await?.name, "persist");

    let other_dim = LanceStorage::open("persist", Some(tmp.path()), Box::new(HashEmbedder::new(32))).await;
    assert!(matches!(other_dim, Err(Error::InvalidConfig(_))));
    Ok(())
}

#[tokio::test]
async fn ephemeral_collection_and_reset() -> anyhow::Result<()> {
    let store = LanceStorage::open("scratch", None, Box::new(HashEmbedder::new(16))).await?;
    store.add_texts(&DOCS, None, None).await?;
    assert_eq!(store.count().await?, 4);
    store.reset().await?;
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_ids_are_rejected_before_writing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = open_tmp(tmp.path(), "dups").await?;
    let same = vec!["same".to_string(), "same".to_string()];
    let err = store.add_texts(&["first text", "second text"], None, Some(&same[..])).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.count().await?, 0);

    let ids = store.add_texts(&DOCS[..2], None, None).await?;
    let twice = vec![ids[0].clone(), ids[0].clone()];
    let texts = vec!["one".to_string(), "two".to_string()];
    let err = store.update(&twice, Some(&texts[..]), None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.get(&ids[..1]).await?[0].text, DOCS[0]);
    Ok(())
}

#[tokio::test]
async fn cosine_and_dot_rank_the_closest_text_first() -> anyhow::Result<()> {
    use qvrag_core::config::Distance;

    for distance in [Distance::Cosine, Distance::Dot] {
        let tmp = tempfile::tempdir()?;
        let store = open_tmp(tmp.path(), "metric").await?.with_distance(distance);
        store.add_texts(&DOCS, None, None).await?;
        let hits = store.query("bread dough baking", 4, None, None).await?;
        assert_eq!(hits.len(), 4);
        assert!(hits[0].text.starts_with("Bread"), "{:?}: {}", distance, hits[0].text);
        let first = hits[0].distance.unwrap();
        assert!(hits[1..].iter().all(|h| h.distance.unwrap() >= first));
    }
    Ok(())
}
