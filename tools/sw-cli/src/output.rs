//! Output formatting for the CLI.

use console::{style, StyledObject};
use serde::Serialize;
use sw_cache::CacheStatus;

/// Kinds of human-readable line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Info,
    Success,
    Warn,
    Error,
    Debug,
}

impl Line {
    fn marker(self) -> StyledObject<&'static str> {
        match self {
            Line::Info => style("ℹ").blue(),
            Line::Success => style("✓").green(),
            Line::Warn => style("⚠").yellow(),
            Line::Error => style("✗").red(),
            Line::Debug => style("→").dim(),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Line::Warn | Line::Error | Line::Debug)
    }
}

/// Output handler for CLI messages.
///
/// In JSON mode only [`Output::json`] and errors are printed, so stdout
/// stays machine-readable.
#[derive(Debug, Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    fn line(&self, kind: Line, msg: &str) {
        if self.json || (kind == Line::Debug && !self.verbose) {
            return;
        }
        let text = match kind {
            Line::Error => style(msg).red().to_string(),
            Line::Debug => style(msg).dim().to_string(),
            _ => msg.to_string(),
        };
        if kind.to_stderr() {
            eprintln!("{} {}", kind.marker(), text);
        } else {
            println!("{} {}", kind.marker(), text);
        }
    }

    pub fn info(&self, msg: &str) {
        self.line(Line::Info, msg);
    }

    pub fn success(&self, msg: &str) {
        self.line(Line::Success, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line(Line::Warn, msg);
    }

    /// Print an error; in JSON mode as `{"error": ...}` on stderr.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        } else {
            self.line(Line::Error, msg);
        }
    }

    /// Only printed with `--verbose`.
    pub fn debug(&self, msg: &str) {
        self.line(Line::Debug, msg);
    }

    pub fn header(&self, msg: &str) {
        if !self.json {
            println!("\n{}", style(msg).bold().underlined());
        }
    }

    /// Pretty-printed JSON on stdout, regardless of mode.
    pub fn json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if !self.json {
            println!("  {}: {}", style(key).dim(), value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if !self.json {
            println!("  {} {}", style("•").dim(), item);
        }
    }

    /// Print columns padded to `widths`.
    pub fn table_row(&self, cols: &[&str], widths: &[usize]) {
        if self.json {
            return;
        }
        let row = cols
            .iter()
            .zip(widths)
            .map(|(col, width)| format!("{:<width$}", col, width = *width))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}", row.trim_end());
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Colored, fixed-width label for a cache status.
pub fn status_badge(status: CacheStatus) -> String {
    let label = format!("{:<7}", status.to_string());
    let styled = style(label);
    match status {
        CacheStatus::Hit => styled.green(),
        CacheStatus::Miss | CacheStatus::Stale => styled.yellow(),
        CacheStatus::Reload => styled.cyan(),
        CacheStatus::Bypass => styled.dim(),
    }
    .to_string()
}

/// Human-readable form of a millisecond duration, e.g. `2h 0m`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(999), "0s");
        assert_eq!(format_duration_ms(59_999), "59s");
        assert_eq!(format_duration_ms(45 * 60 * 1000), "45m 0s");
        assert_eq!(format_duration_ms(2 * 60 * 60 * 1000), "2h 0m");
    }

    #[test]
    fn test_status_badge_keeps_label() {
        console::set_colors_enabled(false);

        assert_eq!(status_badge(CacheStatus::Hit), "HIT    ");
        assert_eq!(status_badge(CacheStatus::Stale).trim_end(), "STALE");
    }
}
