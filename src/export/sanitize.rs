/*!
 * HTML-to-plain-text cleanup shared by every export backend.
 *
 * Story text may carry editor markup. It is rendered to plain text with
 * `html2text` (tags dropped, paragraphs separated, entities decoded) on a
 * very wide line so that each backend keeps control of its own wrapping.
 */

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

/// Wide enough that html2text never wraps story paragraphs
const RENDER_WIDTH: usize = 10_000;

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").expect("valid blank line regex"));

/// Convert HTML-bearing text to plain text
pub fn sanitize_text(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return input.trim().to_string();
    }

    let rendered = match html2text::config::plain_no_decorate().string_from_read(input.as_bytes(), RENDER_WIDTH) {
        Ok(text) => text,
        Err(e) => {
            warn!("HTML to text conversion failed, keeping raw text: {}", e);
            input.to_string()
        }
    };

    let lines = rendered
        .replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS.replace_all(&lines, "\n\n").trim().to_string()
}
