use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::cell::Flags as AlacFlags;
use alacritty_terminal::term::Term;
use alacritty_terminal::vte::ansi::CursorShape as AlacCursorShape;

use crate::cell::{Cell, CellFlags};
use crate::engine::EventProxy;

/// Current state of the cursor.
#[derive(Clone, Debug)]
pub struct CursorState {
    pub row: u16,
    pub col: u16,
    pub shape: CursorShape,
    pub visible: bool,
}

/// Shape of the terminal cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
    Bar,
    Hidden,
}

/// A read-only view into the visible terminal screen.
pub struct GridView<'a> {
    term: &'a Term<EventProxy>,
}

impl<'a> GridView<'a> {
    pub(crate) fn new(term: &'a Term<EventProxy>) -> Self {
        Self { term }
    }

    /// Number of visible rows.
    pub fn rows(&self) -> u16 {
        self.term.screen_lines() as u16
    }

    /// Number of columns.
    pub fn cols(&self) -> u16 {
        self.term.columns() as u16
    }

    /// Get a single cell at the given row and column.
    ///
    /// Row 0 is the top of the visible screen. Out-of-range coordinates
    /// return a default (blank) cell.
    pub fn cell(&self, row: u16, col: u16) -> Cell {
        if (row as usize) >= self.term.screen_lines() || (col as usize) >= self.term.columns() {
            return Cell::default();
        }

        let grid = self.term.grid();
        let cell = &grid[Line(row as i32)][Column(col as usize)];
        convert_cell(cell)
    }

    /// Text content of a row, with trailing blanks removed.
    pub fn row_text(&self, row: u16) -> String {
        let mut text = String::with_capacity(self.cols() as usize);
        for col in 0..self.cols() {
            let cell = self.cell(row, col);
            // Wide-char spacers carry no text of their own.
            if cell.width > 0 {
                text.push(cell.ch);
            }
        }
        text.trim_end().to_string()
    }

    /// Text content of the whole visible screen, rows joined by newlines.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for row in 0..self.rows() {
            if row > 0 {
                out.push('\n');
            }
            out.push_str(&self.row_text(row));
        }
        out
    }
}

/// Convert an alacritty cell to ours.
fn convert_cell(cell: &alacritty_terminal::term::cell::Cell) -> Cell {
    let mut flags = CellFlags::empty();
    if cell.flags.contains(AlacFlags::BOLD) {
        flags |= CellFlags::BOLD;
    }
    if cell.flags.contains(AlacFlags::ITALIC) {
        flags |= CellFlags::ITALIC;
    }
    if cell.flags.contains(AlacFlags::UNDERLINE) {
        flags |= CellFlags::UNDERLINE;
    }
    if cell.flags.contains(AlacFlags::STRIKEOUT) {
        flags |= CellFlags::STRIKETHROUGH;
    }
    if cell.flags.contains(AlacFlags::INVERSE) {
        flags |= CellFlags::INVERSE;
    }
    if cell.flags.contains(AlacFlags::DIM) {
        flags |= CellFlags::DIM;
    }
    if cell.flags.contains(AlacFlags::HIDDEN) {
        flags |= CellFlags::HIDDEN;
    }

    let width = if cell.flags.contains(AlacFlags::WIDE_CHAR) {
        2
    } else if cell.flags.contains(AlacFlags::WIDE_CHAR_SPACER) {
        0
    } else {
        1
    };

    Cell {
        ch: cell.c,
        flags,
        width,
    }
}

/// Convert alacritty's CursorShape to ours.
pub(crate) fn convert_cursor_shape(shape: AlacCursorShape) -> CursorShape {
    match shape {
        AlacCursorShape::Block | AlacCursorShape::HollowBlock => CursorShape::Block,
        AlacCursorShape::Underline => CursorShape::Underline,
        AlacCursorShape::Beam => CursorShape::Bar,
        AlacCursorShape::Hidden => CursorShape::Hidden,
    }
}
