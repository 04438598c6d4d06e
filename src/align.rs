use thiserror::Error;

use crate::annotation::AnnotationSet;
use crate::labels::LabelTable;
use crate::normalize::normalize_whitespace;

pub const UNTAGGED: &str = "untagged";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignError {
    #[error("class id `{0}` is not in the label table")]
    UnknownClassId(String),
}

/// One row of the output table. Positions are character (not byte) indices.
///
/// Tagged rows: `span_end` is exclusive. Untagged rows: `span_end` is the last index
/// of the run and the text stops one character short of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    pub class_id: String,
    pub tag: String,
    pub span_start: usize,
    pub span_end: usize,
    pub original_text: String,
    pub extracted_text: String,
}

impl SpanRecord {
    pub fn is_tagged(&self) -> bool {
        self.class_id != UNTAGGED
    }
}

/// Byte offset to character index, for a fixed text.
struct CharIndex {
    starts: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        Self {
            starts: text.char_indices().map(|(b, _)| b).collect(),
        }
    }

    /// `byte` must be a char boundary (or the text length).
    fn char_at(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(i) | Err(i) => i,
        }
    }
}

/// Finds every non-overlapping occurrence of each normalized snippet in `text`.
///
/// The offset's `start` is not used; a snippet that occurs twice is tagged twice.
/// A class id is only translated once one of its snippets is found, so an unknown
/// id whose text never occurs is not an error.
pub fn locate_tagged(
    text: &str,
    annotations: &AnnotationSet,
    labels: &LabelTable,
) -> Result<Vec<SpanRecord>, AlignError> {
    let index = CharIndex::new(text);
    let mut out = Vec::new();

    for entity in &annotations.entities {
        for offset in &entity.offsets {
            let expected = normalize_whitespace(&offset.text);
            if expected.is_empty() {
                tracing::warn!(class_id = %entity.class_id, start = offset.start, "empty annotation text, skipped");
                continue;
            }

            let mut found = 0usize;
            for (byte_start, matched) in text.match_indices(expected.as_str()) {
                let byte_end = byte_start + matched.len();
                let extracted = &text[byte_start..byte_end];
                // Guard only: a literal search cannot return different text.
                if extracted != expected {
                    tracing::warn!(
                        original = %expected,
                        extracted = %extracted,
                        "annotation text mismatch, occurrence dropped"
                    );
                    continue;
                }
                let tag = labels
                    .get(&entity.class_id)
                    .ok_or_else(|| AlignError::UnknownClassId(entity.class_id.clone()))?;
                found += 1;
                out.push(SpanRecord {
                    class_id: entity.class_id.clone(),
                    tag: tag.to_string(),
                    span_start: index.char_at(byte_start),
                    span_end: index.char_at(byte_end),
                    original_text: expected.clone(),
                    extracted_text: extracted.to_string(),
                });
            }

            match found {
                0 => tracing::debug!(class_id = %entity.class_id, text = %expected, "annotation text not found"),
                1 => {}
                n => tracing::debug!(class_id = %entity.class_id, text = %expected, occurrences = n, "annotation text repeats"),
            }
        }
    }

    Ok(out)
}

fn untagged_record(chars: &[char], first: usize, last: usize) -> SpanRecord {
    let text: String = chars[first..last].iter().collect();
    SpanRecord {
        class_id: UNTAGGED.to_string(),
        tag: UNTAGGED.to_string(),
        span_start: first,
        span_end: last,
        original_text: text.clone(),
        extracted_text: text,
    }
}

/// Fills the gaps between tagged spans.
///
/// A character counts as tagged when it lies in `[span_start, span_end]` of any tagged
/// record, end inclusive, so the character right after a tag is never untagged.
pub fn untagged_spans(text: &str, tagged: &[SpanRecord]) -> Vec<SpanRecord> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }

    let mut covered = vec![false; n];
    for r in tagged {
        if r.span_start >= n {
            continue;
        }
        let last = r.span_end.min(n - 1);
        for c in &mut covered[r.span_start..=last] {
            *c = true;
        }
    }

    let mut out = Vec::new();
    let mut run: Option<(usize, usize)> = None;
    for (i, &is_tagged) in covered.iter().enumerate() {
        if is_tagged {
            if let Some((first, last)) = run.take() {
                out.push(untagged_record(&chars, first, last));
            }
        } else {
            run = match run {
                Some((first, _)) => Some((first, i)),
                None => Some((i, i)),
            };
        }
    }
    if let Some((first, last)) = run {
        out.push(untagged_record(&chars, first, last));
    }
    out
}

/// Tagged and untagged records, stably ordered by `span_start`.
pub fn align(
    text: &str,
    annotations: &AnnotationSet,
    labels: &LabelTable,
) -> Result<Vec<SpanRecord>, AlignError> {
    let mut records = locate_tagged(text, annotations, labels)?;
    let untagged = untagged_spans(text, &records);
    records.extend(untagged);
    records.sort_by_key(|r| r.span_start);
    Ok(records)
}
