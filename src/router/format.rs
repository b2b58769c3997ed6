//! Rendering of log lines for the terminal and for log files.
//!
//! Terminal layout is `HH:MM:SS <name> | text` with the name right-aligned to
//! the widest service name. Long messages wrap to the terminal width and every
//! continuation row repeats the timestamp and the coloured gutter, so a wrapped
//! message stays attributable to its service.

use super::{LogLine, MANAGER, StreamKind};
use console::{Color, Style};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Leading timestamp and service name some children already print.
static CHILD_PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\S*\s+(\S+)\s+").unwrap()
});

static ERROR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bERROR\b").unwrap());

static WARN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bWARN(?:ING)?\b").unwrap());

/// Narrowest body column before wrapping is abandoned.
const MIN_BODY_WIDTH: usize = 20;

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Color256(173),
    Color::Color256(109),
];

/// Formats lines for display. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LineFormatter {
    name_width: usize,
    wrap_width: Option<usize>,
    colors: bool,
    palette_index: HashMap<String, usize>,
}

impl LineFormatter {
    /// Formatter for the given services, without colours or wrapping.
    pub fn new(names: &[String]) -> Self {
        let name_width = names
            .iter()
            .map(|n| n.chars().count())
            .chain(std::iter::once(MANAGER.len()))
            .max()
            .unwrap_or(MANAGER.len());
        Self {
            name_width,
            wrap_width: None,
            colors: false,
            palette_index: names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.clone(), i % PALETTE.len()))
                .collect(),
        }
    }

    /// Formatter sized and coloured for the current stdout.
    pub fn for_terminal(names: &[String]) -> Self {
        let term = console::Term::stdout();
        let width = terminal_size::terminal_size().map(|(w, _)| w.0 as usize);
        Self::new(names)
            .with_wrap_width(width)
            .with_colors(term.is_term() && console::colors_enabled())
    }

    pub fn with_wrap_width(mut self, width: Option<usize>) -> Self {
        self.wrap_width = width;
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn name_width(&self) -> usize {
        self.name_width
    }

    /// Terminal rows for one line.
    pub fn format(&self, line: &LogLine) -> Vec<String> {
        let text = strip_child_prefix(&line.text, &line.service);
        let timestamp = line.timestamp.format("%H:%M:%S").to_string();
        let prefix_width = timestamp.len() + 1 + self.name_width + 3;

        let rows: Vec<String> = match self.wrap_width {
            Some(total) if total >= prefix_width + MIN_BODY_WIDTH => {
                textwrap::wrap(text, total - prefix_width)
                    .into_iter()
                    .map(|c| c.into_owned())
                    .collect()
            }
            _ => text.split('\n').map(str::to_string).collect(),
        };

        let name_style = self.service_style(&line.service);
        let ts = self.paint(&timestamp, Style::new().dim());
        let gutter = self.paint("|", name_style.clone());
        let name = self.paint(
            &format!("{:>width$}", line.service, width = self.name_width),
            name_style,
        );
        let blank = " ".repeat(self.name_width);

        let mut out = Vec::with_capacity(rows.len().max(1));
        for (i, row) in rows.iter().enumerate() {
            let label = if i == 0 { name.as_str() } else { blank.as_str() };
            out.push(format!("{} {} {} {}", ts, label, gutter, self.body(row, line.stream)));
        }
        if out.is_empty() {
            out.push(format!("{} {} {}", ts, name, gutter));
        }
        out
    }

    /// Plain-text file form: local timestamp, stream tag, ANSI stripped.
    pub fn format_file(line: &LogLine, with_service: bool) -> String {
        let timestamp = line.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let text = console::strip_ansi_codes(&line.text);
        if with_service {
            format!("{} {} [{}] {}", timestamp, line.service, line.stream.tag(), text)
        } else {
            format!("{} [{}] {}", timestamp, line.stream.tag(), text)
        }
    }

    fn body(&self, row: &str, stream: StreamKind) -> String {
        if !self.colors {
            return row.to_string();
        }
        if stream == StreamKind::Status {
            return self.paint(row, Style::new().bold());
        }
        let red = Style::new().red().bold().force_styling(true);
        let yellow = Style::new().yellow().force_styling(true);
        let row = ERROR_REGEX.replace_all(row, |c: &regex::Captures| red.apply_to(&c[0]).to_string());
        WARN_REGEX
            .replace_all(&row, |c: &regex::Captures| yellow.apply_to(&c[0]).to_string())
            .into_owned()
    }

    fn service_style(&self, service: &str) -> Style {
        match self.palette_index.get(service) {
            Some(&i) => Style::new().fg(PALETTE[i]),
            None => Style::new().white().bold(),
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.colors {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Drop a `YYYY-MM-DDTHH:MM:SS <service> ` prefix written by the child itself.
pub fn strip_child_prefix<'a>(text: &'a str, service: &str) -> &'a str {
    match CHILD_PREFIX_REGEX.captures(text) {
        Some(caps) if caps[1].eq_ignore_ascii_case(service) => &text[caps[0].len()..],
        _ => text,
    }
}
