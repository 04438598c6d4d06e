use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Class id to human-readable tag. Must cover every `classId` in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: BTreeMap<String, String>,
}

impl LabelTable {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }

    /// The argumentative-essay annotation scheme.
    pub fn builtin() -> Self {
        let pairs = [
            ("e_1", "Claim"),
            ("e_2", "Premise"),
            ("e_4", "MajorClaim"),
            ("f_7", "C_Relevanz"),
            ("f_8", "D_Zirkelschluss"),
            ("f_9", "E_LogischerFehler"),
            ("f_18", "F_Uebergeneralisierung"),
            ("f_20", "A_Support"),
            ("r_3", "zbmfe9vmcn0(e_1|e_2)"),
            ("r_5", "p3f65o55khi(e_4|e_1)"),
            ("r_11", "idepthoebpi(e_2|e_2)"),
        ];
        Self::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Loads a flat JSON object, e.g. `{"e_1": "Claim"}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let labels: BTreeMap<String, String> =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(Self::new(labels))
    }

    pub fn get(&self, class_id: &str) -> Option<&str> {
        self.labels.get(class_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn missing_ids<'a, I>(&self, ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        ids.into_iter()
            .filter(|id| !self.labels.contains_key(id.as_str()))
            .cloned()
            .collect()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_translates_entity_classes() {
        let t = LabelTable::builtin();
        assert_eq!(t.get("e_1"), Some("Claim"));
        assert_eq!(t.get("e_4"), Some("MajorClaim"));
        assert_eq!(t.get("f_20"), Some("A_Support"));
        assert_eq!(t.get("e_99"), None);
        assert_eq!(t.len(), 11);
    }

    #[test]
    fn reports_missing_ids_sorted() {
        let t = LabelTable::builtin();
        let ids: BTreeSet<String> = ["e_9", "e_1", "e_3"].iter().map(|s| s.to_string()).collect();
        let missing: Vec<String> = t.missing_ids(&ids).into_iter().collect();
        assert_eq!(missing, vec!["e_3", "e_9"]);
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("labels.json");
        fs::write(&p, r#"{"e_1": "Behauptung", "e_2": "Praemisse"}"#).unwrap();
        let t = LabelTable::from_json_file(&p).unwrap();
        assert_eq!(t.get("e_1"), Some("Behauptung"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn rejects_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("labels.json");
        fs::write(&p, r#"{"e_1": 1}"#).unwrap();
        assert!(LabelTable::from_json_file(&p).is_err());
    }
}
