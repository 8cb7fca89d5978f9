use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::Local;

/// Everything the formatter needs for one message block.
#[derive(Debug, Clone)]
pub struct SummaryRecord {
    pub subject: String,
    pub from: String,
    pub date: String,
    pub id: String,
    pub permalink: Option<String>,
    pub summary: String,
}

/// Render one digest block: heading, metadata bullets, a blank line, the
/// summary text, then a separator.
pub fn format_summary_md(rec: &SummaryRecord) -> String {
    let mut lines = vec![
        format!("### {}", rec.subject),
        format!("- **From:** {}", rec.from),
        format!("- **Date:** {}", rec.date),
        format!("- **Gmail ID:** `{}`", rec.id),
    ];
    if let Some(link) = &rec.permalink {
        lines.push(format!("- **Link:** {link}"));
    }
    lines.push(String::new());
    lines.push(rec.summary.clone());
    lines.push("\n---\n".to_string());
    lines.join("\n")
}

/// The digest being assembled for one run: a dated header plus one block per
/// summarized message, in fetch order.
pub struct Digest {
    sections: Vec<String>,
}

impl Digest {
    pub fn new() -> Self {
        let stamp = Local::now().format("%Y-%m-%dT%H:%M:%S");
        Self {
            sections: vec![format!("# Email Summaries ({stamp})\n")],
        }
    }

    pub fn push(&mut self, block: String) {
        self.sections.push(block);
    }

    pub fn render(&self) -> String {
        self.sections.join("\n")
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// Persist the rendered digest.
pub fn write_digest(path: &Path, markdown: &str) -> Result<()> {
    fs::write(path, markdown)?;
    Ok(())
}
