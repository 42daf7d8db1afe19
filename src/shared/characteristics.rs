// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraError, Resolution};
use serde_json::{Map, Value, json};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Subdirectory that dumps are written into.
pub const DUMP_DIR_NAME: &str = "Camera2";

/// A characteristics JSON blob and the file it was saved to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharacteristicsDump {
    pub json: String,
    pub file_path: PathBuf,
}

impl CharacteristicsDump {
    pub fn new(json: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            json: json.into(),
            file_path: file_path.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.json.is_empty()
    }

    /// Parses the blob, e.g. to look up a single key.
    pub fn parse(&self) -> Result<Value, CameraError> {
        serde_json::from_str(&self.json).map_err(|e| CameraError::driver("parsing characteristics", e))
    }
}

/// Builder for `{"cameraId": .., "sdk": .., "values": {..}}`.
#[derive(Clone, Debug)]
pub struct CharacteristicsDocument {
    camera_id: String,
    sdk: u32,
    values: Map<String, Value>,
}

impl CharacteristicsDocument {
    pub fn new(camera_id: impl Into<String>, sdk: u32) -> Self {
        Self {
            camera_id: camera_id.into(),
            sdk,
            values: Map::new(),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert_size(&mut self, key: impl Into<String>, size: Resolution) -> &mut Self {
        self.insert(key, size_value(size))
    }

    pub fn to_value(&self) -> Value {
        json!({
            "cameraId": self.camera_id,
            "sdk": self.sdk,
            "values": Value::Object(self.values.clone()),
        })
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

pub fn size_value(size: Resolution) -> Value {
    json!({ "width": size.width, "height": size.height })
}

pub fn rect_value(left: i32, top: i32, right: i32, bottom: i32) -> Value {
    json!({ "left": left, "top": top, "right": right, "bottom": bottom })
}

/// Range bounds are stringified, as the platform reports them.
pub fn range_value(lower: impl ToString, upper: impl ToString) -> Value {
    json!({ "lower": lower.to_string(), "upper": upper.to_string() })
}

pub fn dump_file_name(camera_id: &str) -> String {
    format!("camera_characteristics_{camera_id}.json")
}

/// Writes `json` to `<base_dir>/Camera2/camera_characteristics_<id>.json`,
/// replacing any previous dump, and returns the path.
pub fn save_dump(base_dir: &Path, camera_id: &str, json: &str) -> Result<PathBuf, CameraError> {
    let dir = base_dir.join(DUMP_DIR_NAME);
    fs::create_dir_all(&dir).map_err(|e| CameraError::driver("creating dump directory", e))?;
    let path = dir.join(dump_file_name(camera_id));
    fs::write(&path, json.as_bytes())
        .map_err(|e| CameraError::driver("writing characteristics dump", e))?;
    Ok(path)
}
