use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::align::{align, SpanRecord};
use crate::annotation::load_annotations;
use crate::export::export_document;
use crate::html_text::load_document_text;
use crate::labels::LabelTable;
use crate::lookup::{build_lookup_table, LookupTable, StripMode};

pub const DEFAULT_BOILERPLATE: &str = "a_gNso7y_Y6Q_RCTfWQFZ.s1XM50-473.txt";
pub const LEGACY_PREFIX: &str = "a";

/// Everything the batch needs; built from CLI arguments in `main`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub html_dir: PathBuf,
    pub ann_dir: PathBuf,
    pub html_suffix: String,
    pub ann_suffix: String,
    pub html_prefix: Option<String>,
    pub ann_prefix: Option<String>,
    pub strip_mode: StripMode,
    pub labels: LabelTable,
    pub boilerplate: Vec<String>,
    /// Where spreadsheets go; `None` writes next to each annotation file.
    pub out_dir: Option<PathBuf>,
    pub strict_labels: bool,
}

impl PipelineConfig {
    pub fn new(html_dir: impl Into<PathBuf>, ann_dir: impl Into<PathBuf>) -> Self {
        Self {
            html_dir: html_dir.into(),
            ann_dir: ann_dir.into(),
            html_suffix: ".txt.plain.html".to_string(),
            ann_suffix: ".txt.ann.json".to_string(),
            html_prefix: None,
            ann_prefix: None,
            strip_mode: StripMode::Suffix,
            labels: LabelTable::builtin(),
            boilerplate: vec![DEFAULT_BOILERPLATE.to_string()],
            out_dir: None,
            strict_labels: false,
        }
    }

    /// Key derivation used by the earlier export script: character-set trim of the
    /// suffix, then an `a` prefix on both sides to restore the id's leading `a`.
    pub fn with_legacy_naming(mut self) -> Self {
        self.strip_mode = StripMode::CharSet;
        self.html_prefix = Some(LEGACY_PREFIX.to_string());
        self.ann_prefix = Some(LEGACY_PREFIX.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub unmatched: Vec<String>,
    pub failed: Vec<(String, String)>,
}

fn head_keys(table: &LookupTable) -> Vec<&str> {
    table.keys().take(10).map(|k| k.as_str()).collect()
}

/// Records for one document pair, without touching the output directory.
pub fn process_pair(cfg: &PipelineConfig, html_path: &Path, ann_path: &Path) -> Result<Vec<SpanRecord>> {
    let annotations = load_annotations(ann_path)?;
    let text = load_document_text(html_path, &cfg.boilerplate)?;
    let records = align(&text, &annotations, &cfg.labels)
        .with_context(|| format!("align {}", ann_path.display()))?;
    Ok(records)
}

fn output_dir_for(cfg: &PipelineConfig, ann_path: &Path) -> PathBuf {
    match &cfg.out_dir {
        Some(d) => d.clone(),
        None => ann_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Collects the class ids of every annotation file that has an HTML partner and
/// returns those the label table cannot translate. Unreadable files are left for
/// the per-document pass to report.
pub fn check_label_coverage(
    labels: &LabelTable,
    html_table: &LookupTable,
    ann_table: &LookupTable,
) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for key in html_table.keys() {
        let Some(ann_path) = ann_table.get(key) else { continue };
        match load_annotations(ann_path) {
            Ok(set) => ids.extend(set.class_ids()),
            Err(e) => tracing::debug!(%key, "label scan skipped: {e:#}"),
        }
    }
    labels.missing_ids(&ids)
}

pub fn run_batch(cfg: &PipelineConfig) -> Result<BatchReport> {
    let html_table = build_lookup_table(
        &cfg.html_dir,
        &cfg.html_suffix,
        cfg.html_prefix.as_deref(),
        cfg.strip_mode,
    )?;
    let ann_table = build_lookup_table(
        &cfg.ann_dir,
        &cfg.ann_suffix,
        cfg.ann_prefix.as_deref(),
        cfg.strip_mode,
    )?;
    tracing::info!(html = html_table.len(), annotations = ann_table.len(), "lookup tables built");
    tracing::debug!(keys = ?head_keys(&html_table), "first html keys");
    tracing::debug!(keys = ?head_keys(&ann_table), "first annotation keys");

    let missing = check_label_coverage(&cfg.labels, &html_table, &ann_table);
    if !missing.is_empty() {
        if cfg.strict_labels {
            return Err(anyhow!("label table is missing class ids: {:?}", missing));
        }
        tracing::warn!(?missing, "label table does not cover every class id; documents where those ids match text will fail");
    }

    if let Some(d) = &cfg.out_dir {
        std::fs::create_dir_all(d).with_context(|| format!("create {}", d.display()))?;
    }

    let mut report = BatchReport::default();
    for (key, html_path) in &html_table {
        let Some(ann_path) = ann_table.get(key) else {
            tracing::info!("No match for: {key}");
            report.unmatched.push(key.clone());
            continue;
        };

        let result = process_pair(cfg, html_path, ann_path)
            .and_then(|records| export_document(&output_dir_for(cfg, ann_path), key, &records));
        match result {
            Ok(path) => {
                tracing::info!(%key, path = %path.display(), "spreadsheet written");
                report.written.push(path);
            }
            Err(e) => {
                tracing::error!(%key, "document failed: {e:#}");
                report.failed.push((key.clone(), format!("{e:#}")));
            }
        }
    }

    tracing::info!(
        written = report.written.len(),
        unmatched = report.unmatched.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Corpus {
        _root: tempfile::TempDir,
        html: PathBuf,
        ann: PathBuf,
    }

    fn corpus() -> Corpus {
        let root = tempfile::tempdir().unwrap();
        let html = root.path().join("plain.html").join("pool");
        let ann = root.path().join("ann.json").join("members").join("FH01").join("pool");
        fs::create_dir_all(&html).unwrap();
        fs::create_dir_all(&ann).unwrap();
        Corpus {
            html,
            ann,
            _root: root,
        }
    }

    fn ann_json(class_id: &str, text: &str) -> String {
        format!(r#"{{"entities":[{{"classId":"{class_id}","offsets":[{{"start":2,"text":"{text}"}}]}}]}}"#)
    }

    #[test]
    fn one_matched_and_one_unmatched_document() {
        let c = corpus();
        fs::write(c.html.join("a_d1.txt.plain.html"), "<p>A claim is true.</p>").unwrap();
        fs::write(c.html.join("a_d2.txt.plain.html"), "<p>Nothing to see.</p>").unwrap();
        fs::write(c.ann.join("a_d1.txt.ann.json"), ann_json("e_1", "A claim")).unwrap();

        let report = run_batch(&PipelineConfig::new(&c.html, &c.ann)).unwrap();
        assert_eq!(report.written, vec![c.ann.join("a_d1.xlsx").canonicalize().unwrap()]);
        assert_eq!(report.unmatched, vec!["a_d2".to_string()]);
        assert!(report.failed.is_empty());
        assert!(c.ann.join("a_d1.xlsx").is_file());
        assert!(!c.ann.join("a_d2.xlsx").exists());
    }

    const TAGTOG_ID: &str = "a_gNso7y_Y6Q_RCTfWQFZ.s1XM50-473";

    fn write_tagtog_pair(c: &Corpus) {
        fs::write(
            c.html.join(format!("{TAGTOG_ID}.txt.plain.html")),
            "<p>A claim is true.</p>",
        )
        .unwrap();
        fs::write(
            c.ann.join(format!("{TAGTOG_ID}.txt.ann.json")),
            ann_json("e_1", "A claim"),
        )
        .unwrap();
    }

    #[test]
    fn default_naming_pairs_tagtog_file_names() {
        let c = corpus();
        write_tagtog_pair(&c);

        let report = run_batch(&PipelineConfig::new(&c.html, &c.ann)).unwrap();
        assert!(report.unmatched.is_empty(), "{:?}", report.unmatched);
        assert!(report.failed.is_empty());
        assert_eq!(report.written.len(), 1);
        assert!(c.ann.join(format!("{TAGTOG_ID}.xlsx")).is_file());
    }

    #[test]
    fn legacy_naming_pairs_tagtog_file_names() {
        let c = corpus();
        write_tagtog_pair(&c);

        let cfg = PipelineConfig::new(&c.html, &c.ann).with_legacy_naming();
        let report = run_batch(&cfg).unwrap();
        assert!(report.unmatched.is_empty(), "{:?}", report.unmatched);
        assert_eq!(report.written.len(), 1);
        // the leading 'a' is trimmed with the suffix characters and put back as prefix
        assert!(c.ann.join(format!("{TAGTOG_ID}.xlsx")).is_file());
    }

    #[test]
    fn unknown_class_id_fails_only_that_document() {
        let c = corpus();
        fs::write(c.html.join("a_bad.txt.plain.html"), "<p>A claim.</p>").unwrap();
        fs::write(c.html.join("a_good.txt.plain.html"), "<p>A claim.</p>").unwrap();
        fs::write(c.ann.join("a_bad.txt.ann.json"), ann_json("zz_9", "A claim")).unwrap();
        fs::write(c.ann.join("a_good.txt.ann.json"), ann_json("e_1", "A claim")).unwrap();

        let report = run_batch(&PipelineConfig::new(&c.html, &c.ann)).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a_bad");
        assert!(report.failed[0].1.contains("zz_9"));
    }

    #[test]
    fn strict_labels_stops_before_writing() {
        let c = corpus();
        fs::write(c.html.join("a_x.txt.plain.html"), "<p>A claim.</p>").unwrap();
        fs::write(c.ann.join("a_x.txt.ann.json"), ann_json("zz_9", "A claim")).unwrap();

        let mut cfg = PipelineConfig::new(&c.html, &c.ann);
        cfg.strict_labels = true;
        let err = run_batch(&cfg).unwrap_err();
        assert!(err.to_string().contains("zz_9"));
        assert!(!c.ann.join("a_x.xlsx").exists());
    }

    #[test]
    fn malformed_annotation_is_reported_and_batch_continues() {
        let c = corpus();
        fs::write(c.html.join("a_a.txt.plain.html"), "<p>A claim.</p>").unwrap();
        fs::write(c.html.join("a_b.txt.plain.html"), "<p>A claim.</p>").unwrap();
        fs::write(c.ann.join("a_a.txt.ann.json"), "{\"entities\": [").unwrap();
        fs::write(c.ann.join("a_b.txt.ann.json"), ann_json("e_1", "A claim")).unwrap();

        let report = run_batch(&PipelineConfig::new(&c.html, &c.ann)).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a_a");
        assert_eq!(report.written.len(), 1);
    }

    #[test]
    fn out_dir_override_and_idempotent_output() {
        let c = corpus();
        let out = c.html.parent().unwrap().join("xlsx");
        fs::write(c.html.join("a_d.txt.plain.html"), "<p>A claim is true. A claim.</p>").unwrap();
        fs::write(c.ann.join("a_d.txt.ann.json"), ann_json("e_1", "A  claim")).unwrap();

        let mut cfg = PipelineConfig::new(&c.html, &c.ann);
        cfg.out_dir = Some(out.clone());
        run_batch(&cfg).unwrap();
        let first = fs::read(out.join("a_d.xlsx")).unwrap();
        run_batch(&cfg).unwrap();
        assert_eq!(first, fs::read(out.join("a_d.xlsx")).unwrap());
    }

    #[test]
    fn process_pair_strips_boilerplate_and_aligns() {
        let c = corpus();
        let html = c.html.join("a_p.txt.plain.html");
        let ann = c.ann.join("a_p.txt.ann.json");
        fs::write(&html, format!("<pre>{DEFAULT_BOILERPLATE}\nA claim is true.</pre>")).unwrap();
        fs::write(&ann, ann_json("e_1", "A claim")).unwrap();

        let cfg = PipelineConfig::new(&c.html, &c.ann);
        let records = process_pair(&cfg, &html, &ann).unwrap();
        assert_eq!(records[0].span_start, 0);
        assert_eq!(records[0].tag, "Claim");
    }

    #[test]
    fn missing_input_directory_fails_the_batch() {
        let c = corpus();
        let cfg = PipelineConfig::new(c.html.join("absent"), &c.ann);
        assert!(run_batch(&cfg).is_err());
    }
}
