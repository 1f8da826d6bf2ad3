//! Output formatting for verdicts and run reports

use console::style;
use verificar::{RunReport, VerdictRecord};

/// Renders results as styled text or JSON
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// JSON instead of text
    pub json: bool,
}

impl Printer {
    /// Create a printer
    #[must_use]
    pub const fn new(use_color: bool, quiet: bool, json: bool) -> Self {
        Self {
            use_color,
            quiet,
            json,
        }
    }

    /// One styled line for `record`
    #[must_use]
    pub fn format_record(&self, record: &VerdictRecord) -> String {
        let line = record.line();
        if !self.use_color {
            return line;
        }
        let (status, rest) = line.split_at(4);
        let status = if record.passed {
            style(status).green().bold().force_styling(true)
        } else {
            style(status).red().bold().force_styling(true)
        };
        format!("{status}{rest}")
    }

    /// Text or JSON for a single verdict
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails
    pub fn render_record(&self, record: &VerdictRecord) -> serde_json::Result<String> {
        if self.json {
            return serde_json::to_string_pretty(record);
        }
        let mut out = self.format_record(record);
        for path in &record.artifacts {
            out.push_str(&format!("\n  wrote {}", path.display()));
        }
        for failure in &record.artifact_failures {
            out.push_str(&format!("\n  could not write {failure}"));
        }
        Ok(out)
    }

    /// Text or JSON for a whole run
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails
    pub fn render_report(&self, report: &RunReport) -> serde_json::Result<String> {
        if self.json {
            return serde_json::to_string_pretty(report);
        }
        let text = report.render_text();
        if !self.use_color {
            return Ok(text.trim_end().to_string());
        }
        let summary = if report.all_passed() {
            style(report.summary()).green().force_styling(true)
        } else {
            style(report.summary()).red().force_styling(true)
        };
        let body = text.trim_end().strip_suffix(&report.summary()).unwrap_or(&text);
        Ok(format!("{body}{summary}"))
    }

    /// Print `text` unless quiet; JSON is always printed
    pub fn emit(&self, text: &str) {
        if self.json || !self.quiet {
            println!("{text}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use verificar::{ErrorKind, FailureMode, SeriesReport};

    fn record(passed: bool) -> VerdictRecord {
        VerdictRecord {
            identity: "series_1_1".to_string(),
            series_prefix: "series_1".to_string(),
            image_index: 1,
            passed,
            mismatched_pixel_count: Some(if passed { 0 } else { 4 }),
            total_pixels: Some(9),
            error_kind: (!passed).then_some(ErrorKind::PixelMismatch),
            message: None,
            content_id: None,
            artifacts: vec![PathBuf::from("output/rendered_series_1_1.jpg")],
            artifact_failures: vec![],
            duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_plain_record() {
        let printer = Printer::new(false, false, false);
        let text = printer.render_record(&record(true)).unwrap();
        assert!(text.starts_with("PASS series_1_1 (0 mismatched)"));
        assert!(text.contains("wrote output/rendered_series_1_1.jpg"));
    }

    #[test]
    fn test_colored_record_keeps_text() {
        let printer = Printer::new(true, false, false);
        let line = printer.format_record(&record(false));
        assert!(line.contains("FAIL"));
        assert!(line.contains("series_1_1 (4 mismatched)"));
    }

    #[test]
    fn test_json_record() {
        let printer = Printer::new(false, false, true);
        let json = printer.render_record(&record(false)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["error_kind"], "pixel_mismatch");
    }

    #[test]
    fn test_report_text_ends_with_summary() {
        let mut report = RunReport::start(FailureMode::FailFast);
        let mut series = SeriesReport::new("Series 1", "series_1", 1);
        series.results.push(record(true));
        report.series.push(series);

        let text = Printer::new(false, false, false).render_report(&report).unwrap();
        assert!(text.ends_with("1/1 images passed across 1 series"));
        let colored = Printer::new(true, false, false).render_report(&report).unwrap();
        assert!(colored.contains("Series 1 [series_1]"));
    }
}
