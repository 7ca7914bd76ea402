use std::io::IsTerminal;

use crate::position::Position;
use crate::source;

const RED: &str = "\x1b[91m";
const WHITE: &str = "\x1b[97m";
const PURPLE: &str = "\x1b[95m";
const UNDERLINED: &str = "\x1b[4m";
const NOT_UNDERLINED: &str = "\x1b[24m";
const DEFAULT: &str = "\x1b[0m";

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub position: Position,
}

/// Accumulates errors and warnings for one compilation. Producers keep going
/// until a phase boundary and ask `has_errors` whether to continue; nothing
/// here ever aborts.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_error(&mut self, message: impl Into<String>, position: Position) {
        self.errors.push(Diagnostic {
            message: message.into(),
            position,
        });
    }

    pub fn report_warning(&mut self, message: impl Into<String>, position: Position) {
        self.warnings.push(Diagnostic {
            message: message.into(),
            position,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    pub fn output_errors(&self) {
        let colors = std::io::stderr().is_terminal();
        for diagnostic in &self.errors {
            eprint!("{}", render(diagnostic, "Error", RED, colors));
        }
    }

    pub fn output_warnings(&self) {
        let colors = std::io::stderr().is_terminal();
        for diagnostic in &self.warnings {
            eprint!("{}", render(diagnostic, "Warning", PURPLE, colors));
        }
    }
}

fn paint(text: &str, escape: &str, colors: bool) -> String {
    if colors {
        format!("{escape}{text}{DEFAULT}")
    } else {
        String::from(text)
    }
}

/// Fixed caret format:
///
/// ```text
/// Error: <message>
/// <file> <line>:<col>:  <source line>
///                       ^~~~
/// ```
fn render(diagnostic: &Diagnostic, severity: &str, color: &str, colors: bool) -> String {
    let mut out = String::new();
    let position = &diagnostic.position;

    let prefix = if colors {
        format!("{color}{UNDERLINED}{severity}{NOT_UNDERLINED}{DEFAULT}")
    } else {
        String::from(severity)
    };
    out.push_str(&format!(
        "{prefix}: {}\n",
        paint(&diagnostic.message, WHITE, colors)
    ));

    let filename = position
        .source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let padding = format!("{filename} {position}:  ");
    out.push_str(&padding);

    let line = source::read_line(&position.source_path, position.line);
    let trimmed = line.trim_start_matches([' ', '\t']);
    let trim_offset = line.len() - trimmed.len();

    // Indices of the span inside the trimmed line, clamped so that a stale
    // or empty line cannot push the caret out of bounds.
    let start = position
        .start_index
        .saturating_sub(position.line_index_offset)
        .saturating_sub(trim_offset);
    let end = position
        .end_index
        .saturating_sub(position.line_index_offset)
        .saturating_sub(trim_offset)
        .max(start);

    if start >= trimmed.len() {
        out.push_str(trimmed);
        out.push('\n');
        out.push_str(&" ".repeat(padding.len() + trimmed.len()));
        out.push_str(&paint("^", color, colors));
    } else {
        let end = end.min(trimmed.len() - 1);
        out.push_str(&trimmed[..start]);
        out.push_str(&paint(&trimmed[start..=end], color, colors));
        out.push_str(&trimmed[end + 1..]);
        out.push('\n');
        out.push_str(&" ".repeat(padding.len() + start));
        out.push_str(&paint(&format!("^{}", "~".repeat(end - start)), color, colors));
    }
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn position(path: Rc<PathBuf>, start: usize, end: usize) -> Position {
        Position {
            source_path: path,
            start_index: start,
            end_index: end,
            line_index_offset: 0,
            line: 1,
        }
    }

    #[test]
    fn caret_spans_the_byte_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.frc");
        std::fs::write(&path, "let abc = 1;\n").unwrap();

        let diagnostic = Diagnostic {
            message: String::from("Undefined name 'abc'"),
            position: position(Rc::new(path), 4, 6),
        };
        let text = render(&diagnostic, "Error", RED, false);

        assert!(text.starts_with("Error: Undefined name 'abc'\n"));
        assert!(text.contains("main.frc 1:4:  let abc = 1;\n"));
        assert!(text.contains("^~~"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn sink_orders_and_counts() {
        let mut handler = ErrorHandler::new();
        assert!(!handler.has_errors());

        handler.report_warning("Unused expression", Position::default());
        assert!(!handler.has_errors());

        handler.report_error("Expected ';'", Position::default());
        handler.report_error("Expected ')'", Position::default());
        assert!(handler.has_errors());
        assert_eq!(handler.errors().len(), 2);
        assert_eq!(handler.warnings().len(), 1);

        handler.clear();
        assert!(!handler.has_errors());
    }
}
