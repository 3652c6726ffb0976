// Output formatting for CLI

use std::io::{self, Write};

use serde_json::Value;

use crate::cli::config::OutputFormat;

/// Format and output data
pub struct OutputFormatter {
    format: OutputFormat,
    pub quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Output one document
    pub fn output(&self, value: &Value, writer: &mut impl Write) -> io::Result<()> {
        match self.format {
            OutputFormat::Pretty => writeln!(writer, "{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Json => writeln!(writer, "{}", serde_json::to_string(value)?),
            OutputFormat::Table => self.output_table(value, writer),
        }
    }

    /// Arrays of objects become rows, objects become `key: value` lines
    fn output_table(&self, value: &Value, writer: &mut impl Write) -> io::Result<()> {
        match value {
            Value::Array(rows) => self.output_rows(rows, writer),
            Value::Object(obj) => {
                let max_key_len = obj.keys().map(|k| k.len()).max().unwrap_or(0);
                writeln!(writer, "{}", "=".repeat(max_key_len + 30))?;
                for (key, value) in obj {
                    match value {
                        Value::Array(rows) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
                            writeln!(writer, "{}:", key)?;
                            self.output_rows(rows, writer)?;
                        }
                        _ => writeln!(
                            writer,
                            "{:<width$}{}",
                            format!("{}:", key),
                            self.format_value(value),
                            width = max_key_len + 2
                        )?,
                    }
                }
                writeln!(writer, "{}", "=".repeat(max_key_len + 30))
            }
            other => writeln!(writer, "{}", self.format_value(other)),
        }
    }

    fn output_rows(&self, rows: &[Value], writer: &mut impl Write) -> io::Result<()> {
        let Some(Value::Object(first)) = rows.first() else {
            for row in rows {
                writeln!(writer, "{}", self.format_value(row))?;
            }
            return Ok(());
        };
        let columns: Vec<&String> = first.keys().collect();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| columns.iter().map(|c| self.format_value(row.get(c.as_str()).unwrap_or(&Value::Null))).collect())
            .collect();
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| cells.iter().map(|r| r[i].len()).chain([c.len()]).max().unwrap_or(0))
            .collect();

        let line = |values: Vec<&str>| {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<w$}", v, w = *w))
                .collect::<Vec<_>>()
                .join("  ")
        };
        writeln!(writer, "{}", line(columns.iter().map(|c| c.as_str()).collect()).trim_end())?;
        for row in &cells {
            writeln!(writer, "{}", line(row.iter().map(String::as_str).collect()).trim_end())?;
        }
        Ok(())
    }

    /// Format a JSON value for display
    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => "-".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(arr) => {
                if arr.iter().all(|v| !v.is_array() && !v.is_object()) {
                    arr.iter().map(|v| self.format_value(v)).collect::<Vec<_>>().join(",")
                } else {
                    format!("[{} items]", arr.len())
                }
            }
            Value::Object(obj) => {
                if obj.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{{} items}}", obj.len())
                }
            }
        }
    }

    /// Print success message
    pub fn print_success(&self, message: &str) {
        if !self.quiet {
            eprintln!("✓ {}", message);
        }
    }

    /// Print error message
    pub fn print_error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(format: OutputFormat, value: &Value) -> String {
        let mut out = Vec::new();
        OutputFormatter::new(format, true).output(value, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn table_aligns_rows() {
        let rows = json!([
            {"sequence": 0, "granule": null, "lacing": [30]},
            {"sequence": 1, "granule": 1000, "lacing": [255, 45]},
        ]);
        let text = render(OutputFormat::Table, &rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        // serde_json objects iterate in key order
        assert!(lines[0].starts_with("granule"));
        assert!(lines[0].ends_with("sequence"));
        assert!(lines[1].contains('-'));
        assert!(lines[2].contains("255,45"));
    }

    #[test]
    fn json_is_single_line() {
        let text = render(OutputFormat::Json, &json!({"a": 1, "b": [1, 2]}));
        assert_eq!(text.lines().count(), 1);
    }
}
