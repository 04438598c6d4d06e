use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// One annotation file. Fields other than `entities` are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AnnotationSet {
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Entity {
    #[serde(rename = "classId")]
    pub class_id: String,
    pub offsets: Vec<Offset>,
}

/// `start` is informational; alignment searches the whole text.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Offset {
    pub start: i64,
    pub text: String,
}

impl AnnotationSet {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn class_ids(&self) -> BTreeSet<String> {
        self.entities.iter().map(|e| e.class_id.clone()).collect()
    }
}

pub fn load_annotations(path: &Path) -> Result<AnnotationSet> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    AnnotationSet::from_json_str(&raw).with_context(|| format!("parse {}", path.display()))
}
