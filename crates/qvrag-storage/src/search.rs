//! Decoding LanceDB result batches into domain rows.
use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::arrow::SendableRecordBatchStream;

use qvrag_core::{Error, Metadata, QueryResult, Record, Result};

use crate::schema::{DISTANCE, ID, METADATA, TEXT};

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::store(format!("missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::store(format!("{} column has wrong type", name)))
}

fn parse_metadata(raw: &str) -> Result<Metadata> {
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::store("stored metadata is not a JSON object")),
        Err(e) => Err(Error::store(e)),
    }
}

pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let ids = string_col(batch, ID)?;
    let texts = string_col(batch, TEXT)?;
    let metas = string_col(batch, METADATA)?;
    (0..batch.num_rows())
        .map(|i| {
            Ok(Record {
                id: ids.value(i).to_string(),
                text: texts.value(i).to_string(),
                metadata: parse_metadata(metas.value(i))?,
            })
        })
        .collect()
}

pub fn batch_to_results(batch: &RecordBatch) -> Result<Vec<QueryResult>> {
    let distances = batch.column_by_name(DISTANCE).and_then(|c| c.as_any().downcast_ref::<Float32Array>());
    let records = batch_to_records(batch)?;
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(i, r)| QueryResult {
            id: r.id,
            text: r.text,
            metadata: r.metadata,
            distance: distances.filter(|d| d.is_valid(i)).map(|d| d.value(i)),
        })
        .collect())
}

pub async fn collect_records(mut stream: SendableRecordBatchStream) -> Result<Vec<Record>> {
    let mut out = Vec::new();
    while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
        out.extend(batch_to_records(&batch)?);
    }
    Ok(out)
}

pub async fn collect_results(mut stream: SendableRecordBatchStream) -> Result<Vec<QueryResult>> {
    let mut out = Vec::new();
    while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
        out.extend(batch_to_results(&batch)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use arrow_schema::{DataType, Field, Schema};
    use serde_json::json;

    fn batch(with_distance: bool) -> RecordBatch {
        let mut fields = vec![
            Field::new(ID, DataType::Utf8, false),
            Field::new(TEXT, DataType::Utf8, false),
            Field::new(METADATA, DataType::Utf8, false),
        ];
        let mut cols: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec!["a", "b"])),
            Arc::new(StringArray::from(vec!["first", "second"])),
            Arc::new(StringArray::from(vec![r#"{"n":1}"#, "{}"])),
        ];
        if with_distance {
            fields.push(Field::new(DISTANCE, DataType::Float32, true));
            cols.push(Arc::new(Float32Array::from(vec![0.25, 0.5])));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), cols).unwrap()
    }

    #[test]
    fn results_carry_distance_when_present() {
        let rows = batch_to_results(&batch(true)).unwrap();
        assert_eq!(rows[0].distance, Some(0.25));
        assert_eq!(rows[0].metadata["n"], json!(1));
        assert_eq!(rows[1].text, "second");
        let rows = batch_to_results(&batch(false)).unwrap();
        assert_eq!(rows[0].distance, None);
    }

    #[test]
    fn non_object_metadata_is_store_error() {
        assert!(parse_metadata("[1]").unwrap_err().is_store());
        assert!(parse_metadata("{").unwrap_err().is_store());
    }
}
