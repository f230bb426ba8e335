use bitflags::bitflags;

bitflags! {
    /// Cell attribute flags, packed into a single byte.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        const BOLD          = 0b0000_0001;
        const ITALIC        = 0b0000_0010;
        const UNDERLINE     = 0b0000_0100;
        const STRIKETHROUGH = 0b0000_1000;
        const INVERSE       = 0b0001_0000;
        const DIM           = 0b0010_0000;
        const HIDDEN        = 0b0100_0000;
    }
}

/// A single cell in the terminal grid.
///
/// Color information is intentionally not carried here; Hatch only needs the
/// textual content and attributes of the screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// The character occupying this cell.
    pub ch: char,
    /// Attribute flags (bold, italic, etc.).
    pub flags: CellFlags,
    /// Character width: 1 for normal, 2 for wide (CJK) chars, 0 for spacers.
    pub width: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            flags: CellFlags::empty(),
            width: 1,
        }
    }
}
