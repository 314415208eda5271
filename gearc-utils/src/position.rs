//! Definitions for tracking source position information of gear programs

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// Handle to a position in a [PositionTable]
/// The index refers to the index in the [PositionTable::indices] vector.
pub struct PosIdx(u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// Handle to a file in a [PositionTable]
/// The index refers to the index in the [PositionTable::files] vector.
pub struct FileIdx(u32);

/// A source program file
struct File {
    /// Name of the file
    name: String,
    /// The source code of the file
    source: String,
}

struct PosData {
    /// The file in the program. The index refers to the index in the
    /// [PositionTable::files] vector.
    file: FileIdx,
    /// Start of the span
    start: usize,
    /// End of the span
    end: usize,
}

/// Source position information for gear programs.
pub struct PositionTable {
    /// The source files of the program
    files: Vec<File>,
    /// Mapping from indexes to position data
    indices: Vec<PosData>,
}

impl Default for PositionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTable {
    /// The unknown position
    pub const UNKNOWN: PosIdx = PosIdx(0);

    /// Create a new position table where the first file and first position are unknown
    pub fn new() -> Self {
        let mut table = PositionTable {
            files: Vec::new(),
            indices: Vec::new(),
        };
        table.add_file("unknown".to_string(), "".to_string());
        let pos = table.add_pos(FileIdx(0), 0, 0);
        debug_assert!(pos == Self::UNKNOWN);
        table
    }

    /// Add a new file to the position table
    pub fn add_file(&mut self, name: String, source: String) -> FileIdx {
        let file = File { name, source };
        let file_idx = self.files.len();
        self.files.push(file);
        FileIdx(file_idx as u32)
    }

    fn get_file_data(&self, file: FileIdx) -> &File {
        &self.files[file.0 as usize]
    }

    pub fn get_source(&self, file: FileIdx) -> &str {
        &self.get_file_data(file).source
    }

    pub fn get_name(&self, file: FileIdx) -> &str {
        &self.get_file_data(file).name
    }

    /// Add a new position to the position table
    pub fn add_pos(
        &mut self,
        file: FileIdx,
        start: usize,
        end: usize,
    ) -> PosIdx {
        let pos = PosData { file, start, end };
        let pos_idx = self.indices.len();
        self.indices.push(pos);
        PosIdx(pos_idx as u32)
    }

    fn get_pos(&self, pos: PosIdx) -> &PosData {
        &self.indices[pos.0 as usize]
    }

    /// The text covered by a position.
    pub fn snippet(&self, pos: PosIdx) -> &str {
        let pos_d = self.get_pos(pos);
        let source = self.get_source(pos_d.file);
        source.get(pos_d.start..pos_d.end).unwrap_or("")
    }
}

/// The global position table
pub struct GlobalPositionTable;

impl GlobalPositionTable {
    fn table() -> &'static RwLock<PositionTable> {
        static SINGLETON: OnceLock<RwLock<PositionTable>> = OnceLock::new();
        SINGLETON.get_or_init(|| RwLock::new(PositionTable::new()))
    }

    /// Shared access to the global [PositionTable].
    pub fn read() -> RwLockReadGuard<'static, PositionTable> {
        Self::table().read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive access to the global [PositionTable].
    pub fn write() -> RwLockWriteGuard<'static, PositionTable> {
        Self::table().write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a source file.
    pub fn add_file(name: String, source: String) -> FileIdx {
        Self::write().add_file(name, source)
    }

    /// Register a span inside a registered file.
    pub fn add_pos(file: FileIdx, start: usize, end: usize) -> GPosIdx {
        GPosIdx(Self::write().add_pos(file, start, end))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// A position index backed by the global [PositionTable]
pub struct GPosIdx(pub PosIdx);

impl Default for GPosIdx {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl GPosIdx {
    /// Symbol for the unknown position
    pub const UNKNOWN: GPosIdx = GPosIdx(PosIdx(0));

    /// Convert the position into an optional.
    /// Returns `None` if the position is the unknown position.
    pub fn into_option(self) -> Option<Self> {
        if self == Self::UNKNOWN {
            None
        } else {
            Some(self)
        }
    }

    /// Returns the line containing the start of this span, the byte offset
    /// at which that line starts, and its (1-based) line number.
    fn get_line(table: &PositionTable, pos: PosIdx) -> (String, usize, usize) {
        let pos_d = table.get_pos(pos);
        let source = table.get_source(pos_d.file);
        let start = pos_d.start.min(source.len());
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[start..]
            .find('\n')
            .map_or(source.len(), |i| start + i);
        let linum = source[..start].matches('\n').count() + 1;
        (source[line_start..line_end].to_string(), line_start, linum)
    }

    /// Format this position with the error message `err_msg`
    pub fn format<S: AsRef<str>>(&self, err_msg: S) -> String {
        let table = GlobalPositionTable::read();
        let pos_d = table.get_pos(self.0);
        let name = table.get_name(pos_d.file);
        let (line, line_start, linum) = Self::get_line(&table, self.0);

        let linum_text = format!("{} ", linum);
        let linum_space = " ".repeat(linum_text.len());
        let offset = pos_d.start.saturating_sub(line_start);
        let mark = "^".repeat(
            (pos_d.end - pos_d.start)
                .min(line.len().saturating_sub(offset))
                .max(1),
        );
        let space = " ".repeat(offset);
        format!(
            "{name}\n{linum_text}|{line}\n{linum_space}|{space}{mark} {}",
            err_msg.as_ref()
        )
    }

    /// The file name, line and column (both 1-based) of this position.
    pub fn get_location(&self) -> (String, usize, usize) {
        let table = GlobalPositionTable::read();
        let pos_d = table.get_pos(self.0);
        let (_, line_start, linum) = Self::get_line(&table, self.0);
        (
            table.get_name(pos_d.file).to_string(),
            linum,
            pos_d.start - line_start + 1,
        )
    }

    /// The smallest span covering both positions. Positions from different
    /// files keep `self`.
    pub fn merge(self, other: GPosIdx) -> GPosIdx {
        if self == Self::UNKNOWN {
            return other;
        }
        if other == Self::UNKNOWN {
            return self;
        }
        let (file, start, end) = {
            let table = GlobalPositionTable::read();
            let (a, b) = (table.get_pos(self.0), table.get_pos(other.0));
            if a.file != b.file {
                return self;
            }
            (a.file, a.start.min(b.start), a.end.max(b.end))
        };
        GlobalPositionTable::add_pos(file, start, end)
    }

    /// The source text covered by this position.
    pub fn snippet(&self) -> String {
        GlobalPositionTable::read().snippet(self.0).to_string()
    }

    /// Visualizes the span without any message or marking
    pub fn show(&self) -> String {
        let table = GlobalPositionTable::read();
        let (line, _, linum) = Self::get_line(&table, self.0);
        format!("{} |{}\n", linum, line)
    }
}

/// An IR node that may contain position information.
pub trait WithPos {
    /// Copy the span associated with this node.
    fn copy_span(&self) -> GPosIdx;
}

impl WithPos for GPosIdx {
    fn copy_span(&self) -> GPosIdx {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_and_format() {
        let src = "gear a() -> () {\n    x = y;\n}\n".to_string();
        let file = GlobalPositionTable::add_file("a.gear".into(), src);
        let pos = GlobalPositionTable::add_pos(file, 25, 26);
        assert_eq!(pos.snippet(), "y");
        let (name, line, col) = pos.get_location();
        assert_eq!((name.as_str(), line, col), ("a.gear", 2, 9));
        let msg = pos.format("undefined");
        assert!(msg.contains("2 |    x = y;"));
        assert!(msg.ends_with("^ undefined"));
    }
}
