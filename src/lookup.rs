use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How the file-name suffix is taken off before it becomes a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StripMode {
    /// Remove the suffix once, only when the name ends with it.
    #[default]
    Suffix,
    /// Trim every character that appears anywhere in the suffix, from both ends.
    /// Kept for reproducing tables built by older tooling.
    CharSet,
}

pub type LookupTable = BTreeMap<String, PathBuf>;

pub fn strip_name(name: &str, suffix: &str, mode: StripMode) -> String {
    match mode {
        StripMode::Suffix => name.strip_suffix(suffix).unwrap_or(name).to_string(),
        StripMode::CharSet => name.trim_matches(|c: char| suffix.contains(c)).to_string(),
    }
}

/// Derives the document key for a file name.
///
/// With a prefix the key is always `prefix + stripped`; names starting with `_` or a
/// digit get no separator either.
pub fn derive_key(name: &str, suffix: &str, prefix: Option<&str>, mode: StripMode) -> String {
    let stripped = strip_name(name, suffix, mode);
    match prefix {
        Some(p) => format!("{p}{stripped}"),
        None => stripped,
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read dir entry in {}", dir.display()))?;
        let path = entry.path();
        let ty = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if ty.is_dir() {
            collect_files(&path, out)?;
        } else if ty.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Recursively indexes every regular file below `dir` by its derived key.
///
/// Later files overwrite earlier ones on key collisions. Files are visited in sorted
/// path order, so the winner does not depend on how the OS lists directories.
pub fn build_lookup_table(
    dir: &Path,
    suffix: &str,
    prefix: Option<&str>,
    mode: StripMode,
) -> Result<LookupTable> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut table = LookupTable::new();
    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping file with non UTF-8 name");
            continue;
        };
        let key = derive_key(name, suffix, prefix, mode);
        let abs = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if let Some(prev) = table.insert(key.clone(), abs) {
            tracing::debug!(%key, replaced = %prev.display(), by = %path.display(), "duplicate lookup key");
        }
    }
    Ok(table)
}
