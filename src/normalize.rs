use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(" +").unwrap();
}

/// Whitespace normalization shared by document text and annotation snippets.
///
/// Order matters: trim first (Unicode whitespace, so leading/trailing NBSP goes too),
/// then collapse runs of plain spaces, then turn NBSP into plain spaces. An NBSP that
/// sits next to a space therefore survives as a double space.
pub fn normalize_whitespace(text: &str) -> String {
    let trimmed = text.trim();
    let collapsed = SPACE_RUN.replace_all(trimmed, " ");
    collapsed.replace('\u{00A0}', " ")
}

/// Removes every literal occurrence of each boilerplate string.
pub fn remove_boilerplate(text: &str, boilerplate: &[String]) -> String {
    let mut out = text.to_string();
    for b in boilerplate {
        if b.is_empty() {
            continue;
        }
        out = out.replace(b.as_str(), "");
    }
    out
}
