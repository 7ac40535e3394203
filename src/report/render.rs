//! Tabular rendering of report results.

use std::path::Path;

use tabled::builder::Builder;
use tabled::settings::Style;

use super::stats::Aggregates;
use crate::db::ResultSet;
use crate::error::Error;

const AGGREGATE_LABELS: [&str; 4] = ["Sum", "Avg", "Min", "Max"];

/// File output formats. XLS is recognized but unimplemented and must fail
/// loudly instead of silently downgrading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Txt,
    Csv,
    Xls,
}

/// Render the raw rows followed by the four labeled aggregate rows, for
/// console output. The command layer prints the returned string; nothing
/// here writes to the terminal.
pub fn render_table(result_set: &ResultSet, aggregates: &Aggregates, caption: &str) -> String {
    if result_set.columns.is_empty() {
        return format!("{caption}\n(no rows)\n");
    }

    let mut builder = Builder::default();
    builder.push_record(result_set.column_names());
    for row in &result_set.rows {
        builder.push_record(row.iter().map(|cell| cell.display()));
    }
    let mut raw = builder.build();
    raw.with(Style::ascii());

    let mut builder = Builder::default();
    let mut header = vec![""];
    header.extend(result_set.column_names());
    builder.push_record(header);
    for label in AGGREGATE_LABELS {
        builder.push_record(aggregate_row(label, aggregates));
    }
    let mut stats = builder.build();
    stats.with(Style::ascii());

    format!("{caption}\n{raw}\n\n{stats}\n")
}

fn aggregate_row(label: &str, aggregates: &Aggregates) -> Vec<String> {
    let mut row = vec![label.to_string()];
    for (_, stats) in aggregates.iter() {
        let value = stats.map(|s| match label {
            "Sum" => s.sum,
            "Avg" => s.avg,
            "Min" => s.min,
            _ => s.max,
        });
        row.push(value.map(format_number).unwrap_or_else(|| "NA".to_string()));
    }
    row
}

/// Write the raw rows to a file in the requested format.
pub fn write_file(result_set: &ResultSet, path: &Path, format: FileFormat) -> Result<(), Error> {
    let contents = match format {
        FileFormat::Txt => {
            let mut builder = Builder::default();
            builder.push_record(result_set.column_names());
            for row in &result_set.rows {
                builder.push_record(row.iter().map(|cell| cell.display()));
            }
            let mut table = builder.build();
            table.with(Style::ascii());
            format!("{table}\n")
        }
        FileFormat::Csv => to_csv(result_set),
        FileFormat::Xls => return Err(Error::UnsupportedFormat("xls".to_string())),
    };

    std::fs::write(path, contents).map_err(|source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn to_csv(result_set: &ResultSet) -> String {
    let mut out = String::new();
    out.push_str(&csv_line(
        result_set.column_names().iter().map(|s| s.to_string()),
    ));
    for row in &result_set.rows {
        out.push_str(&csv_line(row.iter().map(|cell| cell.display())));
    }
    out
}

fn csv_line<I: Iterator<Item = String>>(fields: I) -> String {
    let mut line = fields
        .map(|field| csv_field(&field))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Format an aggregate value without trailing fractional noise: integral
/// values print as integers, fractional values keep their digits. The value
/// is formatted and inspected, never pre-rounded.
pub fn format_number(value: f64) -> String {
    let rendered = value.to_string();
    match rendered.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole.to_string(),
        _ => rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Cell, ColumnInfo, ColumnKind};
    use crate::report::aggregate;

    fn sample() -> ResultSet {
        ResultSet {
            columns: vec![
                ColumnInfo {
                    name: "time".to_string(),
                    kind: ColumnKind::Text,
                },
                ColumnInfo {
                    name: "total_input_files".to_string(),
                    kind: ColumnKind::Int,
                },
                ColumnInfo {
                    name: "total_input_bytes".to_string(),
                    kind: ColumnKind::Int,
                },
            ],
            rows: vec![
                vec![
                    Cell::Text("20190115".to_string()),
                    Cell::Int(1),
                    Cell::Int(1000),
                ],
                vec![
                    Cell::Text("20190116".to_string()),
                    Cell::Int(3),
                    Cell::Int(500),
                ],
            ],
        }
    }

    #[test]
    fn format_number_drops_integral_noise() {
        assert_eq!(format_number(1000.0), "1000");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.125), "0.125");
    }

    #[test]
    fn console_table_has_rows_and_labeled_aggregates() {
        let rs = sample();
        let aggregates = aggregate(&rs);
        let rendered = render_table(&rs, &aggregates, "Stream Throughput : S1");

        assert!(rendered.starts_with("Stream Throughput : S1\n"));
        assert!(rendered.contains("20190115"));
        for label in AGGREGATE_LABELS {
            assert!(rendered.contains(label), "missing {label} row");
        }
        // Non-numeric time column renders NA in the aggregate rows.
        assert!(rendered.contains("NA"));
        // Sum of total_input_bytes, formatted without a fractional tail.
        assert!(rendered.contains("1500"));
        assert!(!rendered.contains("1500.0"));
    }

    #[test]
    fn xls_is_an_explicit_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xls");
        let err = write_file(&sample(), &path, FileFormat::Xls).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(!path.exists());
    }

    #[test]
    fn csv_round_trip_preserves_headers_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let rs = sample();
        write_file(&rs, &path, FileFormat::Csv).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "time,total_input_files,total_input_bytes"
        );
        assert_eq!(lines.next().unwrap(), "20190115,1,1000");
        assert_eq!(lines.next().unwrap(), "20190116,3,500");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn csv_quotes_fields_with_separators() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn txt_file_contains_aligned_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        write_file(&sample(), &path, FileFormat::Txt).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("total_input_files"));
        assert!(contents.contains("20190115"));
        assert!(contents.contains('+'));
    }
}
