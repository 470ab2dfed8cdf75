//! Cell grid and style primitives (spec §4.I.E).

use serde::{Deserialize, Serialize};

/// An indexed 256-color or 24-bit RGB terminal color.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Color {
    /// Terminal default foreground/background.
    Default,
    /// One of the 256 indexed colors (0-15 are the standard/bright 16).
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Self::Default
    }
}

/// Visual attributes attached to a single [`Cell`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellStyle {
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// SGR bold (1).
    pub bold: bool,
    /// SGR italic (3).
    pub italic: bool,
    /// SGR underline (4).
    pub underline: bool,
    /// SGR strikethrough (9) — a `vte`-level capability the teacher's
    /// `vt100`-derived style never exposed.
    pub strikethrough: bool,
    /// SGR reverse video (7).
    pub reverse: bool,
}

/// A single grid position: a glyph plus the style it was printed with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// The glyph occupying this cell. Space for an untouched cell.
    pub ch: char,
    /// Display width in columns: 1 for most glyphs, 2 for wide (CJK) glyphs.
    pub width: u8,
    /// Style the glyph was printed with.
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            width: 1,
            style: CellStyle::default(),
        }
    }
}

/// A run of consecutive cells in a row that share an identical style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRun {
    /// Text of the run (one `char` per cell, in column order).
    pub text: String,
    /// Shared style of every cell in the run.
    pub style: CellStyle,
}

/// A fixed-size grid of [`Cell`]s plus cursor position and current SGR state.
#[derive(Clone, Debug)]
pub struct Screen {
    rows: usize,
    cols: usize,
    grid: Vec<Vec<Cell>>,
    cursor_row: usize,
    cursor_col: usize,
    current_style: CellStyle,
    cursor_visible: bool,
}

impl Screen {
    /// Create a blank screen of the given dimensions.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grid: vec![vec![Cell::default(); cols]; rows],
            cursor_row: 0,
            cursor_col: 0,
            current_style: CellStyle::default(),
            cursor_visible: true,
        }
    }

    /// Current dimensions as `(rows, cols)`.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Current cursor position as `(row, col)`, 0-indexed.
    #[must_use]
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    /// Whether the cursor is currently visible (DECTCEM).
    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub(crate) fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    /// Borrow a single row's cells.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.grid.get(index).map(Vec::as_slice)
    }

    /// Run-length-encode a row into style-homogeneous runs.
    #[must_use]
    pub fn row_runs(&self, index: usize) -> Vec<StyleRun> {
        let Some(cells) = self.row(index) else {
            return Vec::new();
        };
        let mut runs: Vec<StyleRun> = Vec::new();
        for cell in cells {
            match runs.last_mut() {
                Some(run) if run.style == cell.style => run.text.push(cell.ch),
                _ => runs.push(StyleRun {
                    text: cell.ch.to_string(),
                    style: cell.style,
                }),
            }
        }
        runs
    }

    /// Resize in place, truncating or padding rows/cols with blank cells.
    /// The cursor is clamped into the new bounds.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.grid.resize(rows, vec![Cell::default(); cols]);
        for row in &mut self.grid {
            row.resize(cols, Cell::default());
        }
        self.rows = rows;
        self.cols = cols;
        self.cursor_row = self.cursor_row.min(rows.saturating_sub(1));
        self.cursor_col = self.cursor_col.min(cols.saturating_sub(1));
    }

    /// Clear every cell back to default and home the cursor.
    pub fn clear(&mut self) {
        self.grid = vec![vec![Cell::default(); self.cols]; self.rows];
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    fn put_char(&mut self, ch: char) {
        if self.cursor_col >= self.cols {
            self.cursor_col = 0;
            self.newline();
        }
        if let Some(row) = self.grid.get_mut(self.cursor_row) {
            if let Some(cell) = row.get_mut(self.cursor_col) {
                cell.ch = ch;
                cell.width = 1;
                cell.style = self.current_style;
            }
        }
        self.cursor_col = self.cursor_col.saturating_add(1);
    }

    fn newline(&mut self) {
        if self.cursor_row + 1 >= self.rows {
            if !self.grid.is_empty() {
                self.grid.remove(0);
                self.grid.push(vec![Cell::default(); self.cols]);
            }
        } else {
            self.cursor_row += 1;
        }
    }

    fn carriage_return(&mut self) {
        self.cursor_col = 0;
    }

    fn backspace(&mut self) {
        self.cursor_col = self.cursor_col.saturating_sub(1);
    }

    fn tab(&mut self) {
        let next_stop = ((self.cursor_col / 8) + 1) * 8;
        self.cursor_col = next_stop.min(self.cols.saturating_sub(1));
    }

    fn move_cursor(&mut self, row: usize, col: usize) {
        self.cursor_row = row.min(self.rows.saturating_sub(1));
        self.cursor_col = col.min(self.cols.saturating_sub(1));
    }

    fn move_up(&mut self, n: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(n);
    }

    fn move_down(&mut self, n: usize) {
        self.cursor_row = (self.cursor_row + n).min(self.rows.saturating_sub(1));
    }

    fn move_forward(&mut self, n: usize) {
        self.cursor_col = (self.cursor_col + n).min(self.cols.saturating_sub(1));
    }

    fn move_back(&mut self, n: usize) {
        self.cursor_col = self.cursor_col.saturating_sub(n);
    }

    fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in self.cursor_row + 1..self.rows {
                    if let Some(r) = self.grid.get_mut(row) {
                        r.fill(Cell::default());
                    }
                }
            }
            1 => {
                self.erase_in_line(1);
                for row in self.grid.iter_mut().take(self.cursor_row) {
                    row.fill(Cell::default());
                }
            }
            _ => self.clear(),
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let Some(row) = self.grid.get_mut(self.cursor_row) else {
            return;
        };
        match mode {
            0 => {
                if let Some(slice) = row.get_mut(self.cursor_col..) {
                    slice.fill(Cell::default());
                }
            }
            1 => {
                let end = (self.cursor_col + 1).min(row.len());
                if let Some(slice) = row.get_mut(..end) {
                    slice.fill(Cell::default());
                }
            }
            _ => row.fill(Cell::default()),
        }
    }

    fn apply_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.current_style = CellStyle::default();
            return;
        }
        let mut iter = params.iter().copied();
        while let Some(code) = iter.next() {
            match code {
                0 => self.current_style = CellStyle::default(),
                1 => self.current_style.bold = true,
                3 => self.current_style.italic = true,
                4 => self.current_style.underline = true,
                7 => self.current_style.reverse = true,
                9 => self.current_style.strikethrough = true,
                22 => self.current_style.bold = false,
                23 => self.current_style.italic = false,
                24 => self.current_style.underline = false,
                27 => self.current_style.reverse = false,
                29 => self.current_style.strikethrough = false,
                30..=37 => self.current_style.fg = Color::Indexed((code - 30) as u8),
                39 => self.current_style.fg = Color::Default,
                40..=47 => self.current_style.bg = Color::Indexed((code - 40) as u8),
                49 => self.current_style.bg = Color::Default,
                90..=97 => self.current_style.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.current_style.bg = Color::Indexed((code - 100 + 8) as u8),
                38 | 48 => {
                    let target_is_fg = code == 38;
                    match iter.next() {
                        Some(5) => {
                            if let Some(index) = iter.next() {
                                let color = Color::Indexed(index as u8);
                                if target_is_fg {
                                    self.current_style.fg = color;
                                } else {
                                    self.current_style.bg = color;
                                }
                            }
                        }
                        Some(2) => {
                            let (r, g, b) = (iter.next(), iter.next(), iter.next());
                            if let (Some(r), Some(g), Some(b)) = (r, g, b) {
                                let color = Color::Rgb(r as u8, g as u8, b as u8);
                                if target_is_fg {
                                    self.current_style.fg = color;
                                } else {
                                    self.current_style.bg = color;
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }
}

/// Operations a VT event stream drives on a [`Screen`]. Kept as an inherent
/// API on `Screen` (not a trait) since only [`super::ScreenController`]
/// drives it, but split out from the parser glue in `terminal/mod.rs` so the
/// grid logic is unit-testable without going through `vte`.
pub(crate) trait ScreenOps {
    fn on_print(&mut self, ch: char);
    fn on_execute(&mut self, byte: u8);
    fn on_cup(&mut self, row: usize, col: usize);
    fn on_cuu(&mut self, n: usize);
    fn on_cud(&mut self, n: usize);
    fn on_cuf(&mut self, n: usize);
    fn on_cub(&mut self, n: usize);
    fn on_ed(&mut self, mode: u16);
    fn on_el(&mut self, mode: u16);
    fn on_sgr(&mut self, params: &[u16]);
}

impl ScreenOps for Screen {
    fn on_print(&mut self, ch: char) {
        self.put_char(ch);
    }

    fn on_execute(&mut self, byte: u8) {
        match byte {
            b'\r' => self.carriage_return(),
            b'\n' => self.newline(),
            0x08 => self.backspace(),
            b'\t' => self.tab(),
            _ => {}
        }
    }

    fn on_cup(&mut self, row: usize, col: usize) {
        self.move_cursor(row, col);
    }

    fn on_cuu(&mut self, n: usize) {
        self.move_up(n);
    }

    fn on_cud(&mut self, n: usize) {
        self.move_down(n);
    }

    fn on_cuf(&mut self, n: usize) {
        self.move_forward(n);
    }

    fn on_cub(&mut self, n: usize) {
        self.move_back(n);
    }

    fn on_ed(&mut self, mode: u16) {
        self.erase_in_display(mode);
    }

    fn on_el(&mut self, mode: u16) {
        self.erase_in_line(mode);
    }

    fn on_sgr(&mut self, params: &[u16]) {
        self.apply_sgr(params);
    }
}
