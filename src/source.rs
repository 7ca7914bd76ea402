use std::path::Path;

pub fn read_file(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}

/// Read a single line by 1-based index, for error display. Returns an empty
/// string when the file or the line cannot be read; diagnostics must never
/// fail harder than the error they are reporting.
pub fn read_line(path: &Path, line_index: u32) -> String {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return String::new();
    };

    contents
        .lines()
        .nth(line_index.saturating_sub(1) as usize)
        .map(String::from)
        .unwrap_or_default()
}
