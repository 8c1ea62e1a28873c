//! Dashboard Export Module
//! Writes every output table as `.xlsx` and `.csv`, and every figure as a
//! standalone `.html` page (inline SVG) plus a `.png`.
//!
//! The workbook is assembled directly as ZIP + SpreadsheetML: one sheet,
//! a header row, inline strings for text and plain numbers otherwise.

use crate::charts::{ChartData, RenderError, StaticChartRenderer};
use crate::data::{numeric_values, text_values, DashboardTables, PipelineError};
use polars::prelude::*;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use ::zip::write::FileOptions;
use ::zip::ZipWriter;

/// Static figure size in pixels.
pub const FIGURE_WIDTH: u32 = 1000;
pub const FIGURE_HEIGHT: u32 = 600;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Workbook error: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("CSV error: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

pub struct DashboardExporter;

impl DashboardExporter {
    /// Export all tables and figures into `dir`, returning the written files.
    pub fn export_dashboard(
        tables: &DashboardTables,
        charts: &[ChartData],
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let mut written = Self::export_tables(tables, dir)?;
        written.extend(Self::export_figures(charts, dir)?);
        info!(dir = %dir.display(), files = written.len(), "dashboard exported");
        Ok(written)
    }

    /// `<view>.xlsx` and `<view>.csv` for every output table.
    pub fn export_tables(tables: &DashboardTables, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        for (stem, df) in tables.named_tables() {
            let xlsx_path = dir.join(format!("{stem}.xlsx"));
            Self::write_xlsx(df, &stem, File::create(&xlsx_path)?)?;
            written.push(xlsx_path);

            let csv_path = dir.join(format!("{stem}.csv"));
            Self::write_csv(df, &csv_path)?;
            written.push(csv_path);
        }
        Ok(written)
    }

    /// `<figure>.html` and `<figure>.png` for every chart.
    pub fn export_figures(charts: &[ChartData], dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        for chart in charts {
            let svg = StaticChartRenderer::render_svg(chart, FIGURE_WIDTH, FIGURE_HEIGHT)?;
            let html_path = dir.join(format!("{}.html", chart.id));
            fs::write(&html_path, html_document(&chart.title, &svg))?;
            written.push(html_path);

            let png = StaticChartRenderer::render_png(chart, FIGURE_WIDTH, FIGURE_HEIGHT)?;
            let png_path = dir.join(format!("{}.png", chart.id));
            fs::write(&png_path, png)?;
            written.push(png_path);
        }
        Ok(written)
    }

    pub fn write_csv(df: &DataFrame, path: &Path) -> Result<(), ExportError> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df.clone())?;
        Ok(())
    }

    /// Single-sheet workbook holding `df`.
    pub fn write_xlsx<W: Write + Seek>(
        df: &DataFrame,
        sheet_name: &str,
        writer: W,
    ) -> Result<(), ExportError> {
        let rows = Self::table_cells(df)?;

        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default();

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml().as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::rels_xml().as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(Self::workbook_xml(sheet_name).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml().as_bytes())?;

        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(Self::sheet_xml(&rows).as_bytes())?;

        zip.finish()?;
        Ok(())
    }

    /// Header row followed by one row per record.
    fn table_cells(df: &DataFrame) -> Result<Vec<Vec<Cell>>, ExportError> {
        let mut rows: Vec<Vec<Cell>> = vec![df
            .get_column_names()
            .iter()
            .map(|name| Cell::Text(name.to_string()))
            .collect()];
        rows.extend((0..df.height()).map(|_| Vec::with_capacity(df.width())));

        for column in df.get_columns() {
            let name = column.name().as_str();
            let cells: Vec<Cell> = if matches!(column.dtype(), DataType::String) {
                let nulls = column.as_materialized_series().is_null();
                text_values(df, name)?
                    .into_iter()
                    .zip(nulls.into_iter())
                    .map(|(v, is_null)| {
                        if is_null.unwrap_or(false) {
                            Cell::Empty
                        } else {
                            Cell::Text(v)
                        }
                    })
                    .collect()
            } else {
                numeric_values(df, name)?
                    .into_iter()
                    .map(|v| match v {
                        Some(v) if v.is_finite() => Cell::Number(v),
                        _ => Cell::Empty,
                    })
                    .collect()
            };
            for (row, cell) in rows[1..].iter_mut().zip(cells) {
                row.push(cell);
            }
        }
        Ok(rows)
    }

    fn content_types_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#
    }

    fn rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
    }

    fn workbook_xml(sheet_name: &str) -> String {
        // Excel caps sheet names at 31 characters
        let name: String = sheet_name.chars().take(31).collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
            xml_escape(&name)
        )
    }

    fn workbook_rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#
    }

    fn sheet_xml(rows: &[Vec<Cell>]) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );

        for (r, row) in rows.iter().enumerate() {
            let row_num = r + 1;
            xml.push_str(&format!(r#"<row r="{row_num}">"#));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", column_letter(c), row_num);
                match cell {
                    Cell::Text(s) => xml.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        xml_escape(s)
                    )),
                    Cell::Number(v) => {
                        xml.push_str(&format!(r#"<c r="{reference}"><v>{v}</v></c>"#))
                    }
                    Cell::Empty => {}
                }
            }
            xml.push_str("</row>");
        }

        xml.push_str("</sheetData></worksheet>");
        xml
    }
}

/// Spreadsheet column name for a zero-based index: 0 -> A, 26 -> AA.
fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Escape markup characters and drop control characters XML 1.0 forbids.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < '\u{20}' => {}
            c => out.push(c),
        }
    }
    out
}

/// Standalone page wrapping an inline SVG figure.
pub fn html_document(title: &str, svg: &str) -> String {
    let title = xml_escape(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>body {{ font-family: sans-serif; margin: 24px; }} svg {{ max-width: 100%; height: auto; }}</style>
</head>
<body>
<h2>{title}</h2>
{svg}
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AliasMap, PipelineContext, Selection, ViewSettings};
    use std::io::{Cursor, Read};
    use ::zip::ZipArchive;

    fn sheet_of(df: &DataFrame) -> String {
        let mut cursor = Cursor::new(Vec::new());
        DashboardExporter::write_xlsx(df, "sheet", &mut cursor).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let mut xml = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn test_xlsx_header_and_cells() {
        let df = df!(
            "country" => ["Albania", "Bosnia & Herzegovina"],
            "suicides_no" => [15i64, 3],
            "suicides_per_100k" => [1000.0, 2.5],
        )
        .unwrap();
        let xml = sheet_of(&df);

        assert!(xml.contains(r#"<c r="A1" t="inlineStr"><is><t>country</t></is></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="inlineStr"><is><t>suicides_per_100k</t></is></c>"#));
        assert!(xml.contains(r#"<c r="A2" t="inlineStr"><is><t>Albania</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B2"><v>15</v></c>"#));
        assert!(xml.contains(r#"<c r="C2"><v>1000</v></c>"#));
        assert!(xml.contains("<t>Bosnia &amp; Herzegovina</t>"));
        assert!(xml.contains(r#"<c r="C3"><v>2.5</v></c>"#));
        assert_eq!(xml.matches("<row ").count(), 3);
    }

    #[test]
    fn test_xlsx_skips_null_cells() {
        let df = df!(
            "country" => [Some("Utopia"), None],
            "lat" => [None, Some(41.15)],
        )
        .unwrap();
        let xml = sheet_of(&df);

        assert!(!xml.contains(r#"r="B2""#));
        assert!(!xml.contains(r#"r="A3""#));
        assert!(xml.contains(r#"<c r="B3"><v>41.15</v></c>"#));
    }

    #[test]
    fn test_xlsx_package_parts() {
        let df = df!("a" => [1i64]).unwrap();
        let mut cursor = Cursor::new(Vec::new());
        DashboardExporter::write_xlsx(&df, "suicides_by_generation", &mut cursor).unwrap();

        let archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "xl/_rels/workbook.xml.rels",
                "xl/workbook.xml",
                "xl/worksheets/sheet1.xml",
            ]
        );
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_html_document_wraps_svg() {
        let html = html_document("Suicides <by> sex", "<svg></svg>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Suicides &lt;by&gt; sex</title>"));
        assert!(html.contains("<svg></svg>"));
    }

    #[test]
    fn test_control_characters_are_dropped() {
        assert_eq!(xml_escape("Cura\u{0}\u{7}\u{1b}\u{1f}ao"), "Curaao");
        assert_eq!(xml_escape("a\tb\nc\rd"), "a\tb\nc\rd");
        assert_eq!(xml_escape("R&D <\"x\">"), "R&amp;D &lt;&quot;x&quot;&gt;");

        let df = df!("country" => ["Bad\u{1}Name"], "suicides_no" => [1i64]).unwrap();
        let xml = sheet_of(&df);
        assert!(xml.contains("<t>BadName</t>"));
        assert!(!xml.contains('\u{1}'));
    }

    #[test]
    fn test_export_figures_writes_html_and_png() {
        if !crate::charts::fonts_available() {
            eprintln!("no chart font installed, skipping");
            return;
        }
        let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data");
        let ctx = PipelineContext::load_inputs(
            &data.join("records_sample.csv"),
            &data.join("coordinates_sample.csv"),
            AliasMap::default(),
            ViewSettings::default(),
        )
        .unwrap();
        let tables = ctx.compute_view(&ctx.default_selection(None)).unwrap();
        let charts = ChartData::from_dashboard(&tables).unwrap();

        let dir = std::env::temp_dir().join(format!("suicide_atlas_figures_{}", std::process::id()));
        let written = DashboardExporter::export_figures(&charts, &dir).unwrap();
        assert_eq!(written.len(), 12);

        for chart in &charts {
            let html = fs::read_to_string(dir.join(format!("{}.html", chart.id))).unwrap();
            assert!(html.starts_with("<!DOCTYPE html>"), "{}", chart.id);
            assert!(html.contains("<svg"), "{}", chart.id);

            let png = fs::read(dir.join(format!("{}.png", chart.id))).unwrap();
            assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"), "{}", chart.id);
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_tables_writes_every_view() {
        let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data");
        let ctx = PipelineContext::load_inputs(
            &data.join("records_sample.csv"),
            &data.join("coordinates_sample.csv"),
            AliasMap::default(),
            ViewSettings::default(),
        )
        .unwrap();
        let tables = ctx.compute_view(&Selection::default()).unwrap();

        let dir = std::env::temp_dir().join(format!("suicide_atlas_export_{}", std::process::id()));
        let written = DashboardExporter::export_tables(&tables, &dir).unwrap();
        assert_eq!(written.len(), 10);
        assert!(dir.join("suicides_by_sex.xlsx").exists());
        assert!(dir.join("top_countries.csv").exists());

        let csv = fs::read_to_string(dir.join("top_countries.csv")).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(header, "country,suicides_no");
        assert!(csv.lines().nth(1).unwrap().starts_with("Russian Federation,"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
