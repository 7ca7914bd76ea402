use std::path::PathBuf;
use std::rc::Rc;

/// Byte span of a token or node inside its source file. `line_index_offset`
/// is the byte offset of the start of the line, so the column can be derived
/// at display time without re-scanning the file.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub source_path: Rc<PathBuf>,
    pub start_index: usize,
    pub end_index: usize,
    pub line_index_offset: usize,
    pub line: u32,
}

impl Position {
    pub fn column(&self) -> usize {
        self.start_index.saturating_sub(self.line_index_offset)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column())
    }
}
