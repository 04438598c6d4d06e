use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::align::SpanRecord;

pub const COLUMNS: [&str; 6] = [
    "classId",
    "tag",
    "span_start",
    "span_end",
    "original_text",
    "extracted_text",
];

enum Cell<'a> {
    Text(&'a str),
    Number(usize),
}

/// Drops characters XML 1.0 cannot carry, then escapes markup.
fn xml_escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            _ => out.push(ch),
        }
    }
    out
}

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}

fn cell_xml(col: usize, row: usize, cell: &Cell<'_>, style: Option<u32>) -> String {
    let r = format!("{}{}", column_letter(col), row);
    let s = style.map(|s| format!(" s=\"{s}\"")).unwrap_or_default();
    match cell {
        Cell::Text(t) => format!(
            "<c r=\"{r}\"{s} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            xml_escape_text(t)
        ),
        Cell::Number(n) => format!("<c r=\"{r}\"{s}><v>{n}</v></c>"),
    }
}

fn row_xml(row: usize, cells: &[Cell<'_>], style: Option<u32>) -> String {
    let mut out = String::new();
    out.push_str(&format!("<row r=\"{row}\">"));
    for (col, c) in cells.iter().enumerate() {
        out.push_str(&cell_xml(col, row, c, style));
    }
    out.push_str("</row>");
    out
}

fn sheet_xml(records: &[SpanRecord]) -> String {
    let mut rows = String::new();
    let header: Vec<Cell<'_>> = COLUMNS.iter().map(|&c| Cell::Text(c)).collect();
    rows.push_str(&row_xml(1, &header, Some(1)));

    for (i, r) in records.iter().enumerate() {
        let cells = [
            Cell::Text(&r.class_id),
            Cell::Text(&r.tag),
            Cell::Number(r.span_start),
            Cell::Number(r.span_end),
            Cell::Text(&r.original_text),
            Cell::Text(&r.extracted_text),
        ];
        rows.push_str(&row_xml(i + 2, &cells, None));
    }

    let last = format!("{}{}", column_letter(COLUMNS.len() - 1), records.len() + 1);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <dimension ref="A1:{last}"/>
  <sheetData>{rows}</sheetData>
</worksheet>"#,
        last = last,
        rows = rows
    )
}

fn content_types_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
}

fn workbook_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#
}

fn workbook_rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#
}

// xf 1 is the bold, thin-bordered header cell
fn styles_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="2">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><sz val="11"/><name val="Calibri"/></font>
  </fonts>
  <fills count="2">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
  </fills>
  <borders count="2">
    <border><left/><right/><top/><bottom/><diagonal/></border>
    <border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border>
  </borders>
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="0" fontId="1" fillId="0" borderId="1" xfId="0" applyFont="1" applyBorder="1"><alignment horizontal="center" vertical="top"/></xf>
  </cellXfs>
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
</styleSheet>"#
}

/// Writes a one-sheet workbook. Entry timestamps are fixed, so equal records give
/// byte-identical output.
pub fn write_workbook<W: Write + Seek>(sink: W, records: &[SpanRecord]) -> Result<W> {
    let mut zip = ZipWriter::new(sink);
    let opts = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    zip.start_file("[Content_Types].xml", opts)?;
    zip.write_all(content_types_xml().as_bytes())?;

    zip.start_file("_rels/.rels", opts)?;
    zip.write_all(rels_xml().as_bytes())?;

    zip.start_file("xl/workbook.xml", opts)?;
    zip.write_all(workbook_xml().as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", opts)?;
    zip.write_all(workbook_rels_xml().as_bytes())?;

    zip.start_file("xl/styles.xml", opts)?;
    zip.write_all(styles_xml().as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", opts)?;
    zip.write_all(sheet_xml(records).as_bytes())?;

    Ok(zip.finish()?)
}

/// Writes `<out_dir>/<key>.xlsx` and returns its path.
pub fn export_document(out_dir: &Path, key: &str, records: &[SpanRecord]) -> Result<PathBuf> {
    let out_path = out_dir.join(format!("{key}.xlsx"));
    let f = File::create(&out_path).with_context(|| format!("create {}", out_path.display()))?;
    let mut w = write_workbook(BufWriter::new(f), records)
        .with_context(|| format!("write {}", out_path.display()))?;
    w.flush()
        .with_context(|| format!("flush {}", out_path.display()))?;
    Ok(out_path)
}
