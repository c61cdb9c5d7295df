//! File-backed stage collaborators used by the `run` command.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use timslake_core::pipeline::{Extractor, Loader, Transformer};
use tracing::info;

pub const LOADED_FILE: &str = "TIMS-loaded.json";

/// Reads a single JSON document as the raw payload.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    pub input: PathBuf,
}

impl Extractor for FileExtractor {
    fn extract(&mut self) -> Result<Value> {
        let body = fs::read(&self.input)
            .with_context(|| format!("failed to read input {}", self.input.display()))?;
        let payload = serde_json::from_slice(&body)
            .with_context(|| format!("input {} is not valid JSON", self.input.display()))?;
        Ok(payload)
    }
}

/// Turns every raw payload into flat records: arrays yield one record per
/// element, objects yield themselves, anything else is wrapped as `{"value": ..}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatteningTransformer;

impl FlatteningTransformer {
    fn to_record(value: &Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        }
    }
}

impl Transformer for FlatteningTransformer {
    type Record = Map<String, Value>;

    fn transform(&mut self, raw: &[Value]) -> Result<Vec<Self::Record>> {
        let records = raw
            .iter()
            .flat_map(|payload| match payload {
                Value::Array(items) => items.iter().map(Self::to_record).collect::<Vec<_>>(),
                other => vec![Self::to_record(other)],
            })
            .collect();
        Ok(records)
    }
}

/// Writes the loaded records, concatenated across snapshots, to one file.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    pub output_dir: PathBuf,
}

impl Loader for JsonFileLoader {
    fn load(&mut self, transformed: Vec<Value>) -> Result<()> {
        let records: Vec<Value> = transformed
            .into_iter()
            .flat_map(|batch| match batch {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect();

        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        let path = self.output_dir.join(LOADED_FILE);
        let body = serde_json::to_string_pretty(&records)?;
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;

        info!(records = records.len(), path = %path.display(), "loaded transformed records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_arrays_objects_and_scalars() {
        let raw = vec![
            json!([{"id": 1}, {"id": 2}]),
            json!({"id": 3}),
            json!(4),
            json!([5]),
        ];

        let records = FlatteningTransformer.transform(&raw).unwrap();
        let records: Vec<Value> = records.into_iter().map(Value::Object).collect();
        assert_eq!(
            records,
            vec![
                json!({"id": 1}),
                json!({"id": 2}),
                json!({"id": 3}),
                json!({"value": 4}),
                json!({"value": 5}),
            ]
        );
    }

    #[test]
    fn loader_concatenates_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = JsonFileLoader {
            output_dir: dir.path().join("loaded"),
        };

        loader
            .load(vec![json!([{"id": 1}]), json!([{"id": 2}, {"id": 3}])])
            .unwrap();

        let body = fs::read_to_string(dir.path().join("loaded").join(LOADED_FILE)).unwrap();
        let written: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(written, json!([{"id": 1}, {"id": 2}, {"id": 3}]));
    }

    #[test]
    fn extractor_reports_missing_input() {
        let mut extractor = FileExtractor {
            input: PathBuf::from("/nonexistent/timslake-input.json"),
        };
        let err = extractor.extract().unwrap_err();
        assert!(err.to_string().contains("failed to read input"));
    }
}
