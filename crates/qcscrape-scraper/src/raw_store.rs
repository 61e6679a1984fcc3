//! Durable storage of captured listing payloads.
//!
//! Layout:
//!
//! ```text
//! <output_dir>/<category_pattern>/lat<lat>_lng<lng>_<unix_ts>_<seq>.json
//! <output_dir>/<category_pattern>/default_location_<unix_ts>_<seq>.json
//! ```

use std::path::{Path, PathBuf};

use qcscrape_core::GeoPoint;
use serde_json::{json, Map, Value};

use crate::error::ScraperError;

const META_KEY: &str = "_meta";
const WRAPPED_KEY: &str = "original_data";

/// Receives every newly observed payload as soon as the capture loop sees it.
pub trait CaptureSink {
    /// Persists the `seq`-th unique payload of the session.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the payload cannot be stored.
    fn persist(&mut self, seq: usize, payload: &Value) -> Result<(), ScraperError>;
}

/// Writes each payload to its own JSON file under the category directory.
#[derive(Debug, Clone)]
pub struct RawCaptureStore {
    dir: PathBuf,
    location: Option<GeoPoint>,
    address: Option<String>,
    category_url: String,
    category_name: String,
}

impl RawCaptureStore {
    #[must_use]
    pub fn new(
        output_dir: &Path,
        category_pattern: &str,
        category_url: &str,
        location: Option<GeoPoint>,
        address: Option<String>,
    ) -> Self {
        Self {
            dir: output_dir.join(category_pattern),
            location,
            address,
            category_url: category_url.to_string(),
            category_name: category_pattern.to_string(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, timestamp: i64, seq: usize) -> String {
        match self.location {
            Some(p) => format!("lat{}_lng{}_{timestamp}_{seq}.json", p.lat, p.lng),
            None => format!("default_location_{timestamp}_{seq}.json"),
        }
    }

    /// The payload as written to disk: augmented with `_meta` when the
    /// location is known.
    fn document(&self, payload: &Value, timestamp: i64) -> Value {
        let Some(point) = self.location else {
            return payload.clone();
        };

        let mut doc = match payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert(WRAPPED_KEY.to_string(), other.clone());
                map
            }
        };
        doc.insert(
            META_KEY.to_string(),
            json!({
                "latitude": point.lat,
                "longitude": point.lng,
                "timestamp": timestamp,
                "address": self.address.as_deref().unwrap_or("Unknown location"),
                "category_url": self.category_url,
                "category_name": self.category_name,
            }),
        );
        Value::Object(doc)
    }
}

impl CaptureSink for RawCaptureStore {
    fn persist(&mut self, seq: usize, payload: &Value) -> Result<(), ScraperError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ScraperError::io(&self.dir, e))?;

        let timestamp = chrono::Utc::now().timestamp();
        let path = self.dir.join(self.file_name(timestamp, seq));
        let body = serde_json::to_string_pretty(&self.document(payload, timestamp)).map_err(
            |e| ScraperError::Json {
                context: format!("raw capture {}", path.display()),
                source: e,
            },
        )?;
        std::fs::write(&path, body).map_err(|e| ScraperError::io(&path, e))?;

        tracing::debug!(path = %path.display(), seq, "saved raw capture");
        Ok(())
    }
}

/// A payload read back from disk, with its `_meta` block split off.
#[derive(Debug, Clone)]
pub struct LoadedCapture {
    pub path: PathBuf,
    pub payload: Value,
    pub location: Option<GeoPoint>,
}

/// Reads every `*.json` capture in `dir`, in file-name order.
///
/// Files that cannot be read or parsed are skipped with a warning. The
/// location comes from `_meta` when present, otherwise from a
/// `lat<lat>_lng<lng>_` file-name prefix.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] if `dir` itself cannot be listed.
pub fn load_raw_captures(dir: &Path) -> Result<Vec<LoadedCapture>, ScraperError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ScraperError::io(dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut captures = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable capture");
                continue;
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed capture");
                continue;
            }
        };

        let (payload, meta_location) = split_meta(value);
        let location = meta_location.or_else(|| location_from_file_name(&path));
        captures.push(LoadedCapture {
            path,
            payload,
            location,
        });
    }

    Ok(captures)
}

/// Lists category directories under `output_dir` as `(pattern, path)` pairs,
/// sorted by pattern.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] if `output_dir` cannot be listed.
pub fn list_category_dirs(output_dir: &Path) -> Result<Vec<(String, PathBuf)>, ScraperError> {
    let mut dirs: Vec<(String, PathBuf)> = std::fs::read_dir(output_dir)
        .map_err(|e| ScraperError::io(output_dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            Some((name, p))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn split_meta(value: Value) -> (Value, Option<GeoPoint>) {
    let Value::Object(mut map) = value else {
        return (value, None);
    };

    let location = map.remove(META_KEY).and_then(|meta| {
        let lat = meta.get("latitude")?.as_f64()?;
        let lng = meta.get("longitude")?.as_f64()?;
        Some(GeoPoint::new(lat, lng))
    });

    if map.len() == 1 {
        if let Some(inner) = map.remove(WRAPPED_KEY) {
            return (inner, location);
        }
    }
    (Value::Object(map), location)
}

fn location_from_file_name(path: &Path) -> Option<GeoPoint> {
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix("lat")?;
    let (lat, rest) = rest.split_once("_lng")?;
    let (lng, _) = rest.split_once('_')?;
    Some(GeoPoint::new(lat.parse().ok()?, lng.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, location: Option<GeoPoint>) -> RawCaptureStore {
        RawCaptureStore::new(
            dir,
            "munchies_bhujia-mixtures_1237_1178",
            "https://blinkit.com/cn/munchies/bhujia-mixtures/cid/1237/1178",
            location,
            Some("Connaught Place, New Delhi".to_string()),
        )
    }

    #[test]
    fn persist_writes_meta_when_location_known() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path(), Some(GeoPoint::new(28.6139, 77.209)));
        store.persist(0, &json!({"widgets": []})).unwrap();

        let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("lat28.6139_lng77.209_"), "got {name}");
        assert!(name.ends_with("_0.json"), "got {name}");

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["_meta"]["latitude"], json!(28.6139));
        assert_eq!(doc["_meta"]["address"], json!("Connaught Place, New Delhi"));
        assert_eq!(
            doc["_meta"]["category_name"],
            json!("munchies_bhujia-mixtures_1237_1178")
        );
        assert_eq!(doc["widgets"], json!([]));
    }

    #[test]
    fn persist_without_location_writes_payload_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path(), None);
        let payload = json!({"response": {"snippets": []}});
        store.persist(3, &payload).unwrap();

        let path = std::fs::read_dir(store.dir())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("default_location_"), "got {name}");
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc, payload);
    }

    #[test]
    fn same_second_captures_do_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(tmp.path(), None);
        store.persist(0, &json!({"a": 1})).unwrap();
        store.persist(1, &json!({"a": 2})).unwrap();
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 2);
    }

    #[test]
    fn non_object_payload_is_wrapped_and_unwrapped() {
        let tmp = tempfile::tempdir().unwrap();
        let location = GeoPoint::new(19.076, 72.8777);
        let mut store = store(tmp.path(), Some(location));
        store.persist(0, &json!([1, 2, 3])).unwrap();

        let loaded = load_raw_captures(store.dir()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].payload, json!([1, 2, 3]));
        assert_eq!(loaded[0].location, Some(location));
    }

    #[test]
    fn load_strips_meta_and_reads_location() {
        let tmp = tempfile::tempdir().unwrap();
        let location = GeoPoint::new(12.97, 77.59);
        let mut store = store(tmp.path(), Some(location));
        store.persist(0, &json!({"widgets": [{"products": []}]})).unwrap();

        let loaded = load_raw_captures(store.dir()).unwrap();
        assert_eq!(loaded[0].location, Some(location));
        assert!(loaded[0].payload.get("_meta").is_none());
        assert_eq!(loaded[0].payload, json!({"widgets": [{"products": []}]}));
    }

    #[test]
    fn load_skips_malformed_files_and_non_json() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.json"), "{not json").unwrap();
        std::fs::write(tmp.path().join("b.json"), r#"{"widgets": []}"#).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        let loaded = load_raw_captures(tmp.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].path.ends_with("b.json"));
        assert_eq!(loaded[0].location, None);
    }

    #[test]
    fn load_orders_by_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["c.json", "a.json", "b.json"] {
            std::fs::write(tmp.path().join(name), format!(r#"{{"name": "{name}"}}"#)).unwrap();
        }
        let loaded = load_raw_captures(tmp.path()).unwrap();
        let names: Vec<&str> = loaded
            .iter()
            .map(|c| c.payload["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "c.json"]);
    }

    #[test]
    fn location_falls_back_to_file_name() {
        let path = Path::new("/x/lat28.6139_lng77.209_1700000000_0.json");
        assert_eq!(
            location_from_file_name(path),
            Some(GeoPoint::new(28.6139, 77.209))
        );
        assert_eq!(
            location_from_file_name(Path::new("/x/default_location_1700000000_0.json")),
            None
        );
    }

    #[test]
    fn load_missing_dir_is_io_error() {
        let err = load_raw_captures(Path::new("/nonexistent/captures")).unwrap_err();
        assert!(matches!(err, ScraperError::Io { .. }), "got: {err:?}");
    }

    #[test]
    fn list_category_dirs_skips_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("b_c_1_2")).unwrap();
        std::fs::create_dir(tmp.path().join("a_b_1_2")).unwrap();
        std::fs::write(tmp.path().join("products.csv"), "").unwrap();

        let dirs = list_category_dirs(tmp.path()).unwrap();
        let names: Vec<&str> = dirs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a_b_1_2", "b_c_1_2"]);
    }
}
