//! Transcript renderers.
//!
//! Pure functions over finalized turns plus descriptive metadata. Callers
//! decide where the output goes (HTTP body, file, terminal).

use crate::transcript::Turn;
use serde::{Deserialize, Serialize};
use serde_json::json;

const BANNER_WIDTH: usize = 80;
const RULE_WIDTH: usize = 40;
const PAGE_BREAK: &str = "<div style=\"page-break-after: always;\"></div>";

/// Messages per page in the Markdown document.
pub const DEFAULT_MESSAGES_PER_PAGE: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub timestamp: Option<String>,
    pub lead_name: String,
    pub lead_type: String,
    pub lead_model: String,
    pub respondent_name: String,
    pub respondent_type: String,
    pub respondent_model: String,
    pub case_title: Option<String>,
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

fn line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

/// Banner header, metadata block, numbered messages and a footer.
pub fn render_text(turns: &[Turn], meta: &ExportMetadata) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    line(&mut out, &format!("{banner}\nMEDICAL VISIT SIMULATION\n{banner}\n"));
    line(&mut out, &format!("Date: {}", meta.timestamp.as_deref().unwrap_or("N/A")));
    line(
        &mut out,
        &format!("Oncologist: {} ({})", or_na(&meta.lead_name), or_na(&meta.lead_type)),
    );
    line(
        &mut out,
        &format!(
            "Patient: {} ({})",
            or_na(&meta.respondent_name),
            or_na(&meta.respondent_type)
        ),
    );
    line(&mut out, &format!("Oncologist Model: {}", or_na(&meta.lead_model)));
    line(&mut out, &format!("Patient Model: {}", or_na(&meta.respondent_model)));
    if let Some(title) = &meta.case_title {
        line(&mut out, &format!("Case: {title}"));
    }
    line(&mut out, &format!("Total Messages: {}", turns.len()));
    line(&mut out, &format!("\n{banner}\n"));

    for (i, turn) in turns.iter().enumerate() {
        line(&mut out, &format!("[Message {}] {}:", i + 1, turn.speaker_name));
        line(&mut out, &rule);
        line(&mut out, &format!("{}\n", turn.content));
    }

    line(&mut out, &format!("{banner}\nEnd of Conversation\n{banner}"));
    out
}

/// Printable Markdown document: a details page followed by transcript pages
/// of at most `messages_per_page` messages each.
pub fn render_markdown(turns: &[Turn], meta: &ExportMetadata, messages_per_page: usize) -> String {
    let per_page = messages_per_page.max(1);
    let mut out = String::new();

    line(&mut out, "# Medical Visit Simulation\n");
    line(&mut out, "## Simulation Details\n");
    line(
        &mut out,
        &format!("- **Date:** {}", meta.timestamp.as_deref().unwrap_or("N/A")),
    );
    line(
        &mut out,
        &format!(
            "- **Oncologist:** {} ({})",
            or_na(&meta.lead_name),
            or_na(&meta.lead_type)
        ),
    );
    line(
        &mut out,
        &format!(
            "- **Patient:** {} ({})",
            or_na(&meta.respondent_name),
            or_na(&meta.respondent_type)
        ),
    );
    line(&mut out, &format!("- **Oncologist Model:** {}", or_na(&meta.lead_model)));
    line(&mut out, &format!("- **Patient Model:** {}", or_na(&meta.respondent_model)));
    if let Some(title) = &meta.case_title {
        line(&mut out, &format!("- **Case:** {title}"));
    }
    line(&mut out, &format!("- **Total Messages:** {}", turns.len()));

    for (page, chunk) in turns.chunks(per_page).enumerate() {
        line(&mut out, &format!("\n{PAGE_BREAK}\n"));
        if page == 0 {
            line(&mut out, "## Conversation Transcript\n");
        }
        for turn in chunk {
            line(&mut out, &format!("**{}:**\n", escape_markdown(&turn.speaker_name)));
            for paragraph in turn.content.lines().filter(|l| !l.trim().is_empty()) {
                line(&mut out, &format!("{}\n", escape_markdown(paragraph)));
            }
        }
    }
    out
}

fn escape_markdown(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// `{ metadata, messages, exported_at }`.
pub fn render_json(turns: &[Turn], meta: &ExportMetadata, exported_at: &str) -> serde_json::Value {
    let messages = turns
        .iter()
        .map(|turn| {
            json!({
                "speaker": turn.speaker_name,
                "role": turn.role,
                "content": turn.content,
                "model": turn.model_tag,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "metadata": meta,
        "messages": messages,
        "exported_at": exported_at,
    })
}
