use std::borrow::Cow;
use std::collections::HashSet;

use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};

use super::TableResult;

/// Maximum width for list-like columns
const MAX_WIDE_COLUMN_WIDTH: usize = 60;

/// Columns that get truncated in table mode
const WIDE_COLUMNS: &[&str] = &["images", "security_context"];

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(result: &TableResult, no_headers: bool) -> String {
        if result.rows.is_empty() {
            return "(0 rows)".to_string();
        }

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);

        let truncate_cols: HashSet<usize> = result
            .columns
            .iter()
            .enumerate()
            .filter(|(_, col)| WIDE_COLUMNS.contains(&col.as_str()))
            .map(|(idx, _)| idx)
            .collect();

        if !no_headers {
            table.set_header(result.columns.iter().map(|c| c.to_uppercase()));
        }

        for row in &result.rows {
            let cells: Vec<Cow<'_, str>> = row
                .iter()
                .enumerate()
                .map(|(idx, val)| {
                    if truncate_cols.contains(&idx) {
                        truncate_value(val, MAX_WIDE_COLUMN_WIDTH)
                    } else {
                        Cow::Borrowed(val.as_str())
                    }
                })
                .collect();
            table.add_row(cells);
        }

        format!("{}\n({} rows)", table, result.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(columns: &[&str], row: Vec<String>) -> TableResult {
        TableResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: vec![row],
        }
    }

    #[test]
    fn test_truncate_value_short() {
        let result = truncate_value("hello", 10);
        assert_eq!(result, "hello");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_value_too_long() {
        let result = truncate_value("this is a very long string that needs truncation", 20);
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), 20);
        assert!(matches!(result, Cow::Owned(_)));
    }

    #[test]
    fn test_truncate_value_unicode() {
        let result = truncate_value("日本語テストです長い文字列", 8);
        assert!(result.chars().count() <= 8);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_truncate_images_column() {
        let images = vec!["registry.example.com/team/app:1.0"; 4].join(",");
        let table = result(&["name", "images"], vec!["dep".to_string(), images.clone()]);

        let output = TableFormatter::format(&table, false);
        assert!(!output.contains(&images));
        assert!(output.contains("..."));
        assert!(output.contains("IMAGES"));
        assert!(output.ends_with("(1 rows)"));
    }

    #[test]
    fn test_no_truncate_normal_column() {
        let long = "a".repeat(80);
        let table = result(&["name", "namespace"], vec![long.clone(), "test".to_string()]);
        assert!(TableFormatter::format(&table, false).contains(&long));
    }

    #[test]
    fn test_no_headers() {
        let table = result(&["name"], vec!["dep".to_string()]);
        assert!(!TableFormatter::format(&table, true).contains("NAME"));
    }

    #[test]
    fn test_empty_result() {
        let table = TableResult {
            columns: vec!["name".to_string()],
            rows: vec![],
        };
        assert_eq!(TableFormatter::format(&table, false), "(0 rows)");
    }
}
