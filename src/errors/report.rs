//! Rendering diagnostics for humans.
//!
//! Two renderers are provided: a compact `file:line:col level: message`
//! form followed by the source line and a caret, and an ariadne report with
//! colored labels, notes and help.

use std::io::Write;

use ariadne::{Color, Config, Label as AriadneLabel, Report, ReportKind, Source};

use super::diagnostic::{Diagnostic, LabelStyle, Severity};
use crate::source::SourceMap;

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// Render a diagnostic in the short caret form.
pub fn render_short(source: &SourceMap, diag: &Diagnostic, color: bool) -> String {
    let (line, col) = source.loc(diag.span.start);
    let level = if color {
        let c = match diag.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Note => BLUE,
        };
        format!("{}{}{}", c, diag.severity.as_str(), RESET)
    } else {
        diag.severity.as_str().to_string()
    };

    let mut out = format!("{}:{}:{} {}: {}\n", source.name(), line, col, level, diag.message);
    out.push_str(source.line_text(line));
    out.push('\n');
    out.push_str(&" ".repeat(col.saturating_sub(1)));
    out.push_str("^\n");
    for note in &diag.notes {
        out.push_str("  = ");
        out.push_str(note);
        out.push('\n');
    }
    out
}

/// Write an ariadne report for a diagnostic.
pub fn write_report<W: Write>(
    source: &SourceMap,
    diag: &Diagnostic,
    color: bool,
    out: W,
) -> std::io::Result<()> {
    let name = source.name();
    let text = source.text();
    let range = char_range(text, diag.span.start, diag.span.end);

    let (kind, main_color) = match diag.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
        Severity::Note => (ReportKind::Advice, Color::Blue),
    };

    let mut report = Report::build(kind, name, range.start)
        .with_config(Config::default().with_color(color))
        .with_message(&diag.message);

    if let Some(code) = &diag.code {
        report = report.with_code(code);
    }

    if diag.labels.is_empty() {
        report = report.with_label(
            AriadneLabel::new((name, range))
                .with_message(&diag.message)
                .with_color(main_color),
        );
    }
    for label in &diag.labels {
        let label_color = match label.style {
            LabelStyle::Primary => main_color,
            LabelStyle::Secondary => Color::Cyan,
        };
        report = report.with_label(
            AriadneLabel::new((name, char_range(text, label.span.start, label.span.end)))
                .with_message(&label.message)
                .with_color(label_color),
        );
    }

    for note in &diag.notes {
        match note.strip_prefix("help: ") {
            Some(help) => report = report.with_help(help),
            None => report = report.with_note(note),
        }
    }

    report.finish().write((name, Source::from(text)), out)
}

/// Print an ariadne report to stderr.
pub fn report_diagnostic(source: &SourceMap, diag: &Diagnostic, color: bool) -> std::io::Result<()> {
    write_report(source, diag, color, std::io::stderr())
}

/// Write every diagnostic in order, stopping at the first write failure.
pub fn report_all<'a, W: Write>(
    source: &SourceMap,
    diags: impl IntoIterator<Item = &'a Diagnostic>,
    color: bool,
    mut out: W,
) -> std::io::Result<()> {
    for diag in diags {
        write_report(source, diag, color, &mut out)?;
    }
    Ok(())
}

/// ariadne addresses characters, spans address bytes.
fn char_range(text: &str, start: usize, end: usize) -> std::ops::Range<usize> {
    let total = text.chars().count();
    let to_chars = |byte: usize| {
        let byte = byte.min(text.len());
        let byte = (0..=byte).rev().find(|b| text.is_char_boundary(*b)).unwrap_or(0);
        text[..byte].chars().count()
    };
    let mut start = to_chars(start).min(total);
    let end = to_chars(end).max(start + 1).min(total);
    if start >= end && start > 0 {
        start = end - 1;
    }
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Span;

    #[test]
    fn test_short_form_points_at_column() {
        let sm = SourceMap::new("net.rv", "node A : T\nmode B->Run\n");
        let diag = Diagnostic::error("unknown node 'B'", Span::new(16, 17, 2, 6));
        let text = render_short(&sm, &diag, false);
        assert_eq!(
            text,
            "net.rv:2:6 error: unknown node 'B'\nmode B->Run\n     ^\n"
        );
    }

    #[test]
    fn test_short_form_includes_help() {
        let sm = SourceMap::new("net.rv", "x\n");
        let diag = Diagnostic::warning("unused", Span::new(0, 1, 1, 1)).with_help("remove it");
        let text = render_short(&sm, &diag, false);
        assert!(text.starts_with("net.rv:1:1 warning: unused\n"));
        assert!(text.ends_with("  = help: remove it\n"));
    }

    #[test]
    fn test_ariadne_report_mentions_message() {
        let sm = SourceMap::new("net.rv", "node A : T\n");
        let diag = Diagnostic::error("duplicate node 'A'", Span::new(5, 6, 1, 6)).with_code("E0200");
        let mut buf = Vec::new();
        write_report(&sm, &diag, false, &mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("duplicate node 'A'"));
        assert!(text.contains("E0200"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_all_writes_in_order() {
        let sm = SourceMap::new("net.rv", "node A : T\nnode A : U\n");
        let first = Diagnostic::error("first problem", Span::new(5, 6, 1, 6));
        let second = Diagnostic::warning("second problem", Span::new(16, 17, 2, 6));
        let mut buf = Vec::new();
        report_all(&sm, [&first, &second], false, &mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf);
        let a = text.find("first problem").expect("first");
        let b = text.find("second problem").expect("second");
        assert!(a < b);
    }

    #[test]
    fn test_report_all_surfaces_write_failures() {
        let sm = SourceMap::new("net.rv", "node A : T\n");
        let diag = Diagnostic::error("lost", Span::new(5, 6, 1, 6));
        let err = report_all(&sm, [&diag], false, BrokenPipe).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_char_range_at_end_of_text() {
        assert_eq!(char_range("abc", 3, 3), 2..3);
        assert_eq!(char_range("", 0, 0), 0..0);
        assert_eq!(char_range("abc", 1, 2), 1..2);
    }
}
