//! Structure-preserving JSON splitting.
//!
//! Objects are walked depth-first and packed into chunks whose serialized form
//! stays under `max_chunk_size` where possible. Every value keeps its full key
//! path, so each chunk is itself a valid, self-describing JSON object. A value
//! that cannot be split further (a long string, an unconverted array) may
//! produce a chunk above the limit.

use serde_json::{Map, Value};

use qvrag_core::{Chunk, Error, Result};

pub(crate) struct JsonSplitter {
    max_chunk_size: usize,
    min_chunk_size: usize,
}

impl JsonSplitter {
    pub(crate) fn new(max_chunk_size: usize) -> Self {
        Self { max_chunk_size, min_chunk_size: max_chunk_size.saturating_sub(200).max(50) }
    }

    pub(crate) fn split_str(&self, text: &str, convert_lists: bool) -> Result<Vec<Chunk>> {
        let data: Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidInput(format!("invalid JSON document: {}", e)))?;
        Ok(self.split_value(&data, convert_lists))
    }

    pub(crate) fn split_value(&self, data: &Value, convert_lists: bool) -> Vec<Chunk> {
        let converted;
        let data = if convert_lists {
            converted = lists_to_objects(data);
            &converted
        } else {
            data
        };
        let Value::Object(_) = data else {
            return vec![Chunk::new(data.to_string())];
        };
        let mut chunks = vec![Map::new()];
        let mut path = Vec::new();
        self.split_into(data, &mut path, &mut chunks);
        chunks
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|c| Chunk::new(Value::Object(c).to_string()))
            .collect()
    }

    fn split_into(&self, data: &Value, path: &mut Vec<String>, chunks: &mut Vec<Map<String, Value>>) {
        match data {
            Value::Object(obj) => {
                for (key, value) in obj {
                    path.push(key.clone());
                    let chunk_size = chunks.last().map_or(0, |c| json_size(&Value::Object(c.clone())));
                    let mut single = Map::new();
                    single.insert(key.clone(), value.clone());
                    let size = json_size(&Value::Object(single));
                    let remaining = self.max_chunk_size.saturating_sub(chunk_size);
                    if size < remaining {
                        set_nested(chunks, path, value.clone());
                    } else {
                        if chunk_size >= self.min_chunk_size {
                            chunks.push(Map::new());
                        }
                        self.split_into(value, path, chunks);
                    }
                    path.pop();
                }
            }
            leaf => set_nested(chunks, path, leaf.clone()),
        }
    }
}

fn json_size(value: &Value) -> usize {
    value.to_string().chars().count()
}

fn set_nested(chunks: &mut [Map<String, Value>], path: &[String], value: Value) {
    let (Some(current), Some((last, parents))) = (chunks.last_mut(), path.split_last()) else {
        return;
    };
    let mut node = current;
    for key in parents {
        let entry = node.entry(key.clone()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else { return };
        node = next;
    }
    node.insert(last.clone(), value);
}

/// Replace arrays with objects keyed by element index, recursively.
fn lists_to_objects(data: &Value) -> Value {
    match data {
        Value::Object(obj) => Value::Object(obj.iter().map(|(k, v)| (k.clone(), lists_to_objects(v))).collect()),
        Value::Array(items) => Value::Object(
            items.iter().enumerate().map(|(i, v)| (i.to_string(), lists_to_objects(v))).collect(),
        ),
        other => other.clone(),
    }
}
