use serde::Serialize;
use std::fmt::Write as FmtWrite;

use crate::models::{OutputFormat, RunReport, SearchResults};

pub trait Formatter {
    fn format_run_report(&self, report: &RunReport) -> String;
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_healthy: bool,
    pub embedding_model: Option<String>,
    pub index_driver: String,
    pub index_url: String,
    pub index_connected: bool,
    pub index_name: String,
    pub index_exists: bool,
    pub index_dimension: Option<u64>,
    pub entry_count: u64,
}

fn listed_ids(ids: &[String]) -> String {
    ids.join(", ")
}

fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{}...", head)
    } else {
        head
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        writeln!(output, "Upload Complete").unwrap();
        writeln!(output, "---------------").unwrap();
        writeln!(output, "Total rows processed: {}", report.total_rows).unwrap();
        writeln!(output, "Entries uploaded:     {}", report.uploaded_count()).unwrap();
        writeln!(output, "Chunks:               {}", report.chunks).unwrap();
        if report.rows_incomplete > 0 {
            writeln!(output, "Incomplete rows:      {}", report.rows_incomplete).unwrap();
        }
        if report.embedding_failures > 0 {
            writeln!(output, "Embedding failures:   {}", report.embedding_failures).unwrap();
        }
        if report.failed_batches > 0 {
            writeln!(
                output,
                "Failed batches:       {} ({} entries)",
                report.failed_batches, report.failed_entries
            )
            .unwrap();
        }
        if let Some(ref error) = report.read_error {
            writeln!(output, "Stopped early:        {}", error).unwrap();
        }
        writeln!(output, "Duration:             {}ms", report.duration_ms).unwrap();
        if !report.uploaded_ids.is_empty() {
            writeln!(output, "Uploaded ids: {}", listed_ids(&report.uploaded_ids)).unwrap();
        }
        output
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Search results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, m) in results.matches.iter().enumerate() {
            writeln!(output, "{}. [Score: {:.3}] {}", i + 1, m.score, m.id).unwrap();
            if let Some(ref text) = m.text {
                writeln!(output, "   {}", preview(text, 200)).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let embedding_status = if status.embedding_healthy {
            "[HEALTHY]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(output, "Embedding:     {}", embedding_status).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        if let Some(ref model) = status.embedding_model {
            writeln!(output, "  Model:       {}", model).unwrap();
        }
        writeln!(output).unwrap();

        let index_status = if status.index_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Index:  {} ({})",
            status.index_driver, index_status
        )
        .unwrap();
        writeln!(output, "  URL:         {}", status.index_url).unwrap();
        writeln!(output, "  Index:       {}", status.index_name).unwrap();
        if status.index_connected {
            if status.index_exists {
                if let Some(dimension) = status.index_dimension {
                    writeln!(output, "  Dimension:   {}", dimension).unwrap();
                }
                writeln!(output, "  Entries:     {}", status.entry_count).unwrap();
            } else {
                writeln!(output, "  Entries:     (index not created yet)").unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

impl Formatter for JsonFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        self.render(report)
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        self.render(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "url": status.embedding_url,
                "healthy": status.embedding_healthy,
                "model": status.embedding_model,
            },
            "index": {
                "driver": status.index_driver,
                "url": status.index_url,
                "connected": status.index_connected,
                "name": status.index_name,
                "exists": status.index_exists,
                "dimension": status.index_dimension,
                "entries": status.entry_count,
            }
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_run_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Upload Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Total rows processed | {} |", report.total_rows).unwrap();
        writeln!(output, "| Entries uploaded | {} |", report.uploaded_count()).unwrap();
        writeln!(output, "| Chunks | {} |", report.chunks).unwrap();
        writeln!(output, "| Incomplete rows | {} |", report.rows_incomplete).unwrap();
        writeln!(output, "| Embedding failures | {} |", report.embedding_failures).unwrap();
        writeln!(output, "| Failed batches | {} |", report.failed_batches).unwrap();
        writeln!(output, "| Failed entries | {} |", report.failed_entries).unwrap();
        writeln!(output, "| Duration | {}ms |", report.duration_ms).unwrap();
        if let Some(ref error) = report.read_error {
            writeln!(output, "\n> ⚠️ **Stopped early:** {}", error).unwrap();
        }
        if !report.uploaded_ids.is_empty() {
            writeln!(output, "\n**Uploaded ids:** {}", listed_ids(&report.uploaded_ids)).unwrap();
        }
        output
    }

    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "## Search Results\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, m) in results.matches.iter().enumerate() {
            writeln!(output, "### {}. `{}` (score {:.3})\n", i + 1, m.id, m.score).unwrap();
            if let Some(ref text) = m.text {
                writeln!(output, "```").unwrap();
                writeln!(output, "{}", text).unwrap();
                writeln!(output, "```\n").unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let embedding_status = if status.embedding_healthy { "✅" } else { "❌" };
        writeln!(output, "### Embedding {}\n", embedding_status).unwrap();
        writeln!(output, "- **URL:** `{}`", status.embedding_url).unwrap();
        if let Some(ref model) = status.embedding_model {
            writeln!(output, "- **Model:** {}", model).unwrap();
        }
        writeln!(output).unwrap();

        let index_status = if status.index_connected { "✅" } else { "❌" };
        writeln!(
            output,
            "### Vector Index ({}) {}\n",
            status.index_driver, index_status
        )
        .unwrap();
        writeln!(output, "- **URL:** `{}`", status.index_url).unwrap();
        writeln!(output, "- **Index:** {}", status.index_name).unwrap();
        if let Some(dimension) = status.index_dimension {
            writeln!(output, "- **Dimension:** {}", dimension).unwrap();
        }
        writeln!(output, "- **Entries:** {}", status.entry_count).unwrap();

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
