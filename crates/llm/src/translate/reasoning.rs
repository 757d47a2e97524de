use std::time::Instant;

use config::ReasoningMode;

const THINK_MARKER: &str = "🤔\n\n";
const RAW_WRAPPER_PREFIX: &str = "<details type=\"reasoning\" open><div>";

/// Accumulates upstream reasoning text until the answer phase freezes it.
#[derive(Debug)]
pub(crate) struct ReasoningBuffer {
    text: String,
    started_at: Instant,
    signature: Option<i64>,
}

impl ReasoningBuffer {
    pub(crate) fn new() -> Self {
        Self {
            text: String::new(),
            started_at: Instant::now(),
            signature: None,
        }
    }

    pub(crate) fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.signature.is_some()
    }

    /// Seconds elapsed since the first thinking frame.
    pub(crate) fn thought_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Freeze the buffer and sign it with the current millisecond
    /// timestamp. Freezing twice keeps the first signature.
    pub(crate) fn freeze(&mut self) -> i64 {
        *self
            .signature
            .get_or_insert_with(|| jiff::Timestamp::now().as_millisecond())
    }
}

/// Render accumulated reasoning text in the configured style.
///
/// Every mode is idempotent: markup is removed only when present, and the
/// raw wrapper is not applied twice.
pub(crate) fn render(text: &str, mode: ReasoningMode, thought_seconds: u64) -> String {
    match mode {
        ReasoningMode::Think => render_think(text),
        ReasoningMode::Pure => render_pure(text),
        ReasoningMode::Raw => render_raw(text, thought_seconds),
    }
}

fn render_think(text: &str) -> String {
    let stripped = strip_markup(text);

    if stripped.starts_with(THINK_MARKER) {
        stripped
    } else {
        format!("{THINK_MARKER}{stripped}")
    }
}

fn render_pure(text: &str) -> String {
    let stripped = strip_markup(text);

    stripped
        .lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_raw(text: &str, thought_seconds: u64) -> String {
    if text.trim_start().starts_with(RAW_WRAPPER_PREFIX) {
        return text.to_string();
    }

    format!(
        "<details type=\"reasoning\" open><div>\n\n{text}\n\n</div><summary>Thought for {thought_seconds} seconds</summary></details>"
    )
}

/// Undo [`render`] in raw mode, returning the original buffer.
pub(crate) fn strip_raw_wrapper(text: &str) -> Option<&str> {
    let inner = text.trim_start().strip_prefix(RAW_WRAPPER_PREFIX)?;
    let inner = inner.strip_prefix("\n\n")?;
    let end = inner.find("\n\n</div><summary>")?;

    Some(&inner[..end])
}

/// Remove upstream reasoning markup: `<details>` wrappers first, then
/// `<summary>` blocks and `<div>` tags, then leading quote markers.
fn strip_markup(text: &str) -> String {
    let mut out = text.to_string();

    while let Some(start) = out.find("<details") {
        match out[start..].find('>') {
            Some(end) => out.replace_range(start..start + end + 1, ""),
            None => break,
        }
    }

    out = out.replace("</details>", "");

    while let Some(start) = out.find("<summary>") {
        match out[start..].find("</summary>") {
            Some(end) => out.replace_range(start..start + end + "</summary>".len(), ""),
            None => break,
        }
    }

    out = out.replace("<div>", "").replace("</div>", "");

    let unquoted = out
        .lines()
        .map(|line| line.strip_prefix("> ").unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n");

    unquoted.trim_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn think_mode_strips_markup_and_prepends_marker() {
        let input = "<details type=\"reasoning\" open>\n> First thought\n> Second thought\n</details>";
        let rendered = render(input, ReasoningMode::Think, 3);

        assert_eq!(rendered, "🤔\n\nFirst thought\nSecond thought");
    }

    #[test]
    fn think_mode_is_idempotent() {
        let once = render("Let me ponder", ReasoningMode::Think, 1);
        let twice = render(&once, ReasoningMode::Think, 1);

        assert_eq!(once, twice);
    }

    #[test]
    fn pure_mode_quotes_every_non_empty_line() {
        let rendered = render("First\n\nSecond", ReasoningMode::Pure, 1);

        assert_eq!(rendered, "> First\n\n> Second");
    }

    #[test]
    fn pure_mode_is_idempotent() {
        let once = render("First\nSecond", ReasoningMode::Pure, 1);
        let twice = render(&once, ReasoningMode::Pure, 1);

        assert_eq!(once, twice);
    }

    #[test]
    fn details_removed_before_quote_markers() {
        let input = "> <details open>wrapped</details>";
        let rendered = render(input, ReasoningMode::Pure, 1);

        assert_eq!(rendered, "> wrapped");
    }

    #[test]
    fn raw_mode_wraps_and_reports_elapsed_time() {
        let rendered = render("deep thought", ReasoningMode::Raw, 42);

        assert!(rendered.starts_with("<details type=\"reasoning\" open><div>\n\n"));
        assert!(rendered.contains("Thought for 42 seconds"));
    }

    #[test]
    fn raw_mode_is_reversible_and_idempotent() {
        let original = "deep thought";
        let once = render(original, ReasoningMode::Raw, 7);
        let twice = render(&once, ReasoningMode::Raw, 7);

        assert_eq!(once, twice);
        assert_eq!(strip_raw_wrapper(&once), Some(original));
    }

    #[test]
    fn freezing_twice_keeps_the_first_signature() {
        let mut buffer = ReasoningBuffer::new();
        buffer.push("thought");

        let first = buffer.freeze();
        let second = buffer.freeze();

        assert_eq!(first, second);
        assert!(buffer.is_frozen());
    }
}
