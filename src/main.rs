//! A terminal calculator for the reduced row-echelon form of complex matrices, built
//! with ratatui. A keypad-style workflow: pick the matrix dimensions (1x1 up to 9x9),
//! type each cell as a delimiter-free complex literal (`3-2.5i`, `-i`, `.5+i`), solve,
//! then browse the reduced grid with a high-precision readout of the selected cell.

pub mod app {

    use anyhow::Result;
    use tracing::info;

    use crate::editor::state::EditorState;
    use crate::ui::terminal::TerminalApp;

    /// Entry point for the application.
    pub fn main_loop() -> Result<()> {
        info!("starting matrix editor");

        let mut state = EditorState::new();
        let mut ui = TerminalApp::new()?;
        ui.run(&mut state)
    }

}

pub mod input {

    //! The key vocabulary the editor speaks, decoupled from any particular device.

    /// Scan codes of the original keypad, kept stable for hosts that deliver raw
    /// codes instead of translated events.
    #[allow(dead_code)]
    pub mod code {
        pub const RIGHT: u16 = 1;
        pub const LEFT: u16 = 2;
        pub const UP: u16 = 3;
        pub const DOWN: u16 = 4;
        pub const ENTER: u16 = 5;
        pub const CLEAR: u16 = 9;
        pub const MODE: u16 = 69;
        pub const ADD: u16 = 128;
        pub const SUB: u16 = 129;
        pub const NEGATE: u16 = 140;
        pub const DECIMAL: u16 = 141;
        pub const IMAG: u16 = 238;
        /// First of the ten contiguous digit codes, `142..=151` for digits `0..=9`.
        pub const DIGIT_BASE: u16 = 142;
    }

    /// One key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Key {
        Right,
        Left,
        Up,
        Down,
        Confirm,
        Clear,
        Abort,
        Digit(u8),
        Plus,
        Minus,
        Dot,
        Imag,
    }

    impl Key {
        /// Translates a raw keypad scan code. The subtract and negate keys both map
        /// to `Minus`; unknown codes are dropped.
        #[allow(dead_code)]
        pub fn from_code(raw: u16) -> Option<Key> {
            match raw {
                code::RIGHT => Some(Key::Right),
                code::LEFT => Some(Key::Left),
                code::UP => Some(Key::Up),
                code::DOWN => Some(Key::Down),
                code::ENTER => Some(Key::Confirm),
                code::CLEAR => Some(Key::Clear),
                code::MODE => Some(Key::Abort),
                code::ADD => Some(Key::Plus),
                code::SUB | code::NEGATE => Some(Key::Minus),
                code::DECIMAL => Some(Key::Dot),
                code::IMAG => Some(Key::Imag),
                c if (code::DIGIT_BASE..code::DIGIT_BASE + 10).contains(&c) => {
                    Some(Key::Digit((c - code::DIGIT_BASE) as u8))
                }
                _ => None,
            }
        }
    }


}

pub mod core {
    pub mod complex {

            use std::ops::{Add, Div, Mul, Sub};

            /// Near-zero threshold shared by pivot selection and display snapping.
            pub const EPSILON: f32 = 1e-6;

            /// A complex number as a real/imaginary pair.
            #[derive(Debug, Clone, Copy, PartialEq)]
            pub struct Complex {
                pub re: f32,
                pub im: f32,
            }

            impl Complex {
                pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

                pub fn new(re: f32, im: f32) -> Self {
                    Self { re, im }
                }

                /// Magnitude (absolute value).
                pub fn magnitude(self) -> f32 {
                    (self.re * self.re + self.im * self.im).sqrt()
                }

                /// Multiplies both components by a real factor.
                #[allow(dead_code)]
                pub fn scale(self, factor: f32) -> Self {
                    Self::new(self.re * factor, self.im * factor)
                }
            }

            impl Add for Complex {
                type Output = Complex;

                fn add(self, rhs: Complex) -> Complex {
                    Complex::new(self.re + rhs.re, self.im + rhs.im)
                }
            }

            impl Sub for Complex {
                type Output = Complex;

                fn sub(self, rhs: Complex) -> Complex {
                    Complex::new(self.re - rhs.re, self.im - rhs.im)
                }
            }

            impl Mul for Complex {
                type Output = Complex;

                // (a + bi)(c + di) = (ac - bd) + (ad + bc)i
                fn mul(self, rhs: Complex) -> Complex {
                    Complex::new(
                        self.re * rhs.re - self.im * rhs.im,
                        self.re * rhs.im + self.im * rhs.re,
                    )
                }
            }

            impl Div for Complex {
                type Output = Complex;

                /// Multiplies by the conjugate over the squared magnitude. Callers
                /// must have established that the divisor's magnitude exceeds
                /// [`EPSILON`]; dividing by a near-zero value is not defined.
                fn div(self, rhs: Complex) -> Complex {
                    let denom = rhs.re * rhs.re + rhs.im * rhs.im;
                    Complex::new(
                        (self.re * rhs.re + self.im * rhs.im) / denom,
                        (self.im * rhs.re - self.re * rhs.im) / denom,
                    )
                }
            }


    }

    pub mod grid {

            use std::ops::{Index, IndexMut};

            use crate::core::complex::Complex;

            /// Largest supported matrix extent along either axis.
            pub const MAX_DIM: usize = 9;

            /// Zero-based row and column indices.
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct CellPos {
                pub row: usize,
                pub col: usize,
            }

            /// An owned, row-major rectangular grid indexed by `(row, col)` pairs.
            #[derive(Debug, Clone, PartialEq)]
            pub struct Grid<T> {
                rows: usize,
                cols: usize,
                cells: Vec<T>,
            }

            /// A rectangular grid of complex values.
            pub type Matrix = Grid<Complex>;

            impl<T: Clone> Grid<T> {
                /// Creates a rows x cols grid with every cell set to `fill`.
                pub fn filled(rows: usize, cols: usize, fill: T) -> Self {
                    Self {
                        rows,
                        cols,
                        cells: vec![fill; rows * cols],
                    }
                }
            }

            impl<T> Grid<T> {
                /// Builds a grid from explicit rows; every row must have the same length.
                pub fn from_rows(data: Vec<Vec<T>>) -> Self {
                    let rows = data.len();
                    let cols = data.first().map_or(0, |r| r.len());
                    let mut cells = Vec::with_capacity(rows * cols);
                    for row in data {
                        assert_eq!(row.len(), cols, "ragged rows");
                        cells.extend(row);
                    }
                    Self { rows, cols, cells }
                }

                pub fn rows(&self) -> usize {
                    self.rows
                }

                pub fn cols(&self) -> usize {
                    self.cols
                }

                /// Swaps two whole rows in place.
                pub fn swap_rows(&mut self, a: usize, b: usize) {
                    if a == b {
                        return;
                    }
                    for j in 0..self.cols {
                        self.cells.swap(a * self.cols + j, b * self.cols + j);
                    }
                }
            }

            impl<T> Index<(usize, usize)> for Grid<T> {
                type Output = T;

                fn index(&self, (row, col): (usize, usize)) -> &T {
                    assert!(row < self.rows && col < self.cols, "cell out of bounds");
                    &self.cells[row * self.cols + col]
                }
            }

            impl<T> IndexMut<(usize, usize)> for Grid<T> {
                fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
                    assert!(row < self.rows && col < self.cols, "cell out of bounds");
                    &mut self.cells[row * self.cols + col]
                }
            }


    }

    pub mod cell {

            /// Capacity of one cell's text buffer; appends past this are ignored.
            pub const CELL_CAPACITY: usize = 15;

            /// The raw, not-yet-parsed text of one matrix cell. Never empty; a fresh
            /// or cleared cell holds the single character `0`.
            #[derive(Debug, Clone, PartialEq)]
            pub struct CellBuffer {
                text: String,
            }

            impl CellBuffer {
                pub fn new() -> Self {
                    Self {
                        text: "0".to_string(),
                    }
                }

                /// Appends a character, ignoring it once the buffer is full.
                pub fn push(&mut self, c: char) {
                    if self.text.len() < CELL_CAPACITY {
                        self.text.push(c);
                    }
                }

                /// Resets the buffer to the default `0`.
                pub fn reset(&mut self) {
                    self.text.clear();
                    self.text.push('0');
                }

                pub fn as_str(&self) -> &str {
                    &self.text
                }
            }

            impl Default for CellBuffer {
                fn default() -> Self {
                    Self::new()
                }
            }


    }

    pub mod parser {

            //! Reconstructs a complex number from the delimiter-free character
            //! sequence typed into a cell.

            use crate::core::complex::Complex;

            /// Converts one cell's raw character sequence into a complex value.
            ///
            /// A single left-to-right scan keeps one signed accumulator for the run
            /// currently being typed and commits it to the real or imaginary field
            /// when a sign, an `i`, or the end of the string arrives. A bare `i` (or
            /// `-i`) defaults its coefficient to one with the pending sign. Parsing
            /// never fails: an unusual sequence still produces a deterministic value.
            pub fn parse_complex(text: &str) -> Complex {
                let mut real = 0.0f32;
                let mut imag = 0.0f32;
                let mut acc = 0.0f32;
                let mut negative = false;
                let mut decimals = 0i32; // 0 while still in the integer part
                let mut real_part = true;

                for c in text.chars() {
                    match c {
                        '0'..='9' => {
                            let digit = (c as u8 - b'0') as f32;
                            if decimals > 0 {
                                acc = acc.abs() + digit * 10f32.powi(-decimals);
                                decimals += 1;
                            } else {
                                acc = (acc * 10.0).abs() + digit;
                            }
                            if negative {
                                acc = -acc;
                            }
                        }
                        '.' => decimals = 1,
                        'i' => {
                            real_part = false;
                            // A run with no digits yet means a unit coefficient.
                            if acc == 0.0 {
                                acc = if negative { -1.0 } else { 1.0 };
                            }
                            imag = acc;
                            acc = 0.0;
                        }
                        '-' | '+' => {
                            if real_part {
                                real = acc;
                            } else if acc != 0.0 {
                                // Digits typed after an `i` re-commit to imag; a run
                                // the `i` already committed is left alone.
                                imag = acc;
                            }
                            negative = c == '-';
                            real_part = true;
                            decimals = 0;
                            acc = 0.0;
                        }
                        _ => {}
                    }
                }

                if real_part && acc != 0.0 {
                    real = acc;
                } else if acc != 0.0 {
                    imag = acc;
                }

                Complex::new(real, imag)
            }


    }

    pub mod format {

            //! Canonical display strings for complex values.

            use crate::core::complex::{Complex, EPSILON};

            /// Decimal places used in the dense result grid.
            pub const GRID_PRECISION: usize = 1;
            /// Decimal places used in the single-cell readout.
            pub const DETAIL_PRECISION: usize = 4;

            /// Replaces components with magnitude below [`EPSILON`] by exact zero.
            /// Applied to the dense grid view only; the detail readout shows raw
            /// values.
            pub fn snap(value: Complex) -> Complex {
                Complex::new(
                    if value.re.abs() < EPSILON { 0.0 } else { value.re },
                    if value.im.abs() < EPSILON { 0.0 } else { value.im },
                )
            }

            /// Formats a complex value at the given decimal precision.
            ///
            /// The real part is printed only when non-zero. A positive imaginary
            /// part takes a `+` separator only when a real part precedes it; a
            /// negative one always carries its own sign. Exact zero formats as `0`.
            pub fn format_complex(value: Complex, precision: usize) -> String {
                let mut out = String::new();
                if value.re != 0.0 {
                    out.push_str(&format!("{:.*}", precision, value.re));
                }
                if value.im < 0.0 || (value.im > 0.0 && value.re == 0.0) {
                    out.push_str(&format!("{:.*}i", precision, value.im));
                } else if value.im > 0.0 && value.re != 0.0 {
                    out.push_str(&format!("+{:.*}i", precision, value.im));
                }
                if value.re == 0.0 && value.im == 0.0 {
                    out.push('0');
                }
                out
            }


    }

    pub mod rref {

            //! Complex Gaussian elimination.

            use crate::core::complex::EPSILON;
            use crate::core::grid::Matrix;

            /// Reduces a matrix to row-echelon form over the complex field.
            ///
            /// Operates on a copy; the input is untouched. Pivot selection takes the
            /// first row at or below the current one whose entry in the lead column
            /// has magnitude above [`EPSILON`]. When the lead pointer runs off the
            /// right edge during that search, the matrix is returned in its current
            /// state, even if rows below were never processed.
            pub fn rref(matrix: &Matrix) -> Matrix {
                let mut a = matrix.clone();
                let rows = a.rows();
                let cols = a.cols();
                let mut lead = 0;

                for r in 0..rows {
                    if lead >= cols {
                        break;
                    }

                    // Find the pivot row for the lead column.
                    let mut i = r;
                    while a[(i, lead)].magnitude() <= EPSILON {
                        i += 1;
                        if i == rows {
                            i = r;
                            lead += 1;
                            if lead == cols {
                                return a;
                            }
                        }
                    }
                    a.swap_rows(i, r);

                    // Normalize the pivot row. The pivot's magnitude exceeds EPSILON
                    // by construction of the search.
                    let pivot = a[(r, lead)];
                    for j in 0..cols {
                        a[(r, j)] = a[(r, j)] / pivot;
                    }

                    // Zero the lead column in every other row.
                    for k in 0..rows {
                        if k == r {
                            continue;
                        }
                        let factor = a[(k, lead)];
                        for j in 0..cols {
                            let term = factor * a[(r, j)];
                            a[(k, j)] = a[(k, j)] - term;
                        }
                    }

                    lead += 1;
                }

                a
            }


    }

}

pub mod editor {
    pub mod nav {

            //! Row-major cursor movement shared by the cell editor and the result
            //! browser.

            use crate::core::grid::CellPos;

            /// Outcome of one cursor step against the grid bounds.
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub enum Step {
                Moved,
                ExitStart,
                ExitEnd,
                ExitTop,
                ExitBottom,
            }

            /// A cursor over a rows x cols grid. Horizontal steps run in row-major
            /// order and wrap across rows; stepping past an edge reports which edge
            /// was crossed instead of moving, leaving the caller to decide what the
            /// exit means.
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct GridCursor {
                rows: usize,
                cols: usize,
                pub pos: CellPos,
            }

            impl GridCursor {
                pub fn new(rows: usize, cols: usize, pos: CellPos) -> Self {
                    Self { rows, cols, pos }
                }

                pub fn origin(rows: usize, cols: usize) -> Self {
                    Self::new(rows, cols, CellPos { row: 0, col: 0 })
                }

                /// Moves one cell back in row-major order.
                pub fn back(&mut self) -> Step {
                    if self.pos.row == 0 && self.pos.col == 0 {
                        return Step::ExitStart;
                    }
                    if self.pos.col == 0 {
                        self.pos.row -= 1;
                        self.pos.col = self.cols - 1;
                    } else {
                        self.pos.col -= 1;
                    }
                    Step::Moved
                }

                /// Moves one cell forward in row-major order.
                pub fn forward(&mut self) -> Step {
                    if self.pos.row == self.rows - 1 && self.pos.col == self.cols - 1 {
                        return Step::ExitEnd;
                    }
                    if self.pos.col == self.cols - 1 {
                        self.pos.col = 0;
                        self.pos.row += 1;
                    } else {
                        self.pos.col += 1;
                    }
                    Step::Moved
                }

                pub fn up(&mut self) -> Step {
                    if self.pos.row == 0 {
                        return Step::ExitTop;
                    }
                    self.pos.row -= 1;
                    Step::Moved
                }

                pub fn down(&mut self) -> Step {
                    if self.pos.row == self.rows - 1 {
                        return Step::ExitBottom;
                    }
                    self.pos.row += 1;
                    Step::Moved
                }

                /// Places the cursor on the bottom-right cell.
                pub fn jump_to_end(&mut self) {
                    self.pos = CellPos {
                        row: self.rows - 1,
                        col: self.cols - 1,
                    };
                }
            }

            #[cfg(test)]
            mod tests {
                use super::*;

                #[test]
                fn forward_wraps_to_the_next_row() {
                    let mut c = GridCursor::new(2, 3, CellPos { row: 0, col: 2 });
                    assert_eq!(c.forward(), Step::Moved);
                    assert_eq!(c.pos, CellPos { row: 1, col: 0 });
                }

                #[test]
                fn forward_past_the_last_cell_reports_the_exit() {
                    let mut c = GridCursor::new(2, 3, CellPos { row: 1, col: 2 });
                    assert_eq!(c.forward(), Step::ExitEnd);
                    assert_eq!(c.pos, CellPos { row: 1, col: 2 });
                }

                #[test]
                fn back_wraps_to_the_previous_row() {
                    let mut c = GridCursor::new(2, 3, CellPos { row: 1, col: 0 });
                    assert_eq!(c.back(), Step::Moved);
                    assert_eq!(c.pos, CellPos { row: 0, col: 2 });
                }

                #[test]
                fn back_from_the_origin_reports_the_exit() {
                    let mut c = GridCursor::origin(2, 3);
                    assert_eq!(c.back(), Step::ExitStart);
                    assert_eq!(c.pos, CellPos { row: 0, col: 0 });
                }

                #[test]
                fn up_and_down_report_the_edges_without_moving() {
                    let mut c = GridCursor::new(2, 2, CellPos { row: 0, col: 1 });
                    assert_eq!(c.up(), Step::ExitTop);
                    assert_eq!(c.pos, CellPos { row: 0, col: 1 });
                    assert_eq!(c.down(), Step::Moved);
                    assert_eq!(c.down(), Step::ExitBottom);
                    assert_eq!(c.pos, CellPos { row: 1, col: 1 });
                }

                #[test]
                fn jump_to_end_targets_the_bottom_right() {
                    let mut c = GridCursor::origin(4, 5);
                    c.jump_to_end();
                    assert_eq!(c.pos, CellPos { row: 3, col: 4 });
                }

                #[test]
                fn single_cell_grid_exits_in_every_direction() {
                    let mut c = GridCursor::origin(1, 1);
                    assert_eq!(c.forward(), Step::ExitEnd);
                    assert_eq!(c.back(), Step::ExitStart);
                    assert_eq!(c.up(), Step::ExitTop);
                    assert_eq!(c.down(), Step::ExitBottom);
                }
            }

    }

    pub mod state {

            //! The editing workflow: dimension selection, cell entry, result
            //! browsing. Key events drive the state through `apply`; rendering only
            //! reads it.

            use tracing::debug;

            use crate::core::cell::CellBuffer;
            use crate::core::complex::Complex;
            use crate::core::format::{format_complex, snap, GRID_PRECISION};
            use crate::core::grid::{CellPos, Grid, Matrix, MAX_DIM};
            use crate::core::parser::parse_complex;
            use crate::core::rref::rref;
            use crate::editor::nav::{GridCursor, Step};
            use crate::input::Key;

            /// Matrix dimensions, each in `1..=MAX_DIM`.
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct Dims {
                pub rows: usize,
                pub cols: usize,
            }

            /// The solved grid and everything needed to browse it read-only.
            #[derive(Debug, Clone)]
            pub struct SolvedView {
                pub grid: Matrix,
                pub display: Grid<String>,
                pub in_grid: bool,
                pub cursor: GridCursor,
            }

            /// One discrete mode of the editing workflow. The focused cell exists
            /// exactly while cells are being edited.
            #[derive(Debug, Clone)]
            pub enum Phase {
                SelectingRows,
                SelectingCols,
                EditingCells { focus: GridCursor },
                Solved(SolvedView),
            }

            /// Whether the event loop should keep running.
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub enum Control {
                Continue,
                Exit,
            }

            /// All mutable editor state.
            #[derive(Debug, Clone)]
            pub struct EditorState {
                pub dims: Dims,
                pub buffers: Grid<CellBuffer>,
                pub phase: Phase,
            }

            impl EditorState {
                /// A fresh 1x1 editor waiting for a row count.
                pub fn new() -> Self {
                    Self {
                        dims: Dims { rows: 1, cols: 1 },
                        buffers: Grid::filled(MAX_DIM, MAX_DIM, CellBuffer::new()),
                        phase: Phase::SelectingRows,
                    }
                }

                /// Advances the state machine by one key event.
                pub fn apply(&mut self, key: Key) -> Control {
                    if key == Key::Abort {
                        return Control::Exit;
                    }
                    match self.phase {
                        Phase::SelectingRows => self.apply_selecting_rows(key),
                        Phase::SelectingCols => self.apply_selecting_cols(key),
                        Phase::EditingCells { .. } => self.apply_editing(key),
                        Phase::Solved(_) => self.apply_solved(key),
                    }
                    Control::Continue
                }

                fn apply_selecting_rows(&mut self, key: Key) {
                    match key {
                        Key::Digit(d) if d > 0 => {
                            self.dims.rows = d as usize;
                            self.phase = Phase::SelectingCols;
                        }
                        Key::Confirm | Key::Right | Key::Down => {
                            self.phase = Phase::SelectingCols;
                        }
                        _ => {}
                    }
                }

                fn apply_selecting_cols(&mut self, key: Key) {
                    match key {
                        Key::Digit(d) if d > 0 => {
                            self.dims.cols = d as usize;
                            self.enter_cells();
                        }
                        Key::Confirm | Key::Right | Key::Down => self.enter_cells(),
                        Key::Left => self.phase = Phase::SelectingRows,
                        _ => {}
                    }
                }

                fn enter_cells(&mut self) {
                    self.phase = Phase::EditingCells {
                        focus: GridCursor::origin(self.dims.rows, self.dims.cols),
                    };
                }

                fn apply_editing(&mut self, key: Key) {
                    let mut focus = match self.phase {
                        Phase::EditingCells { focus } => focus,
                        _ => return,
                    };
                    let cell = (focus.pos.row, focus.pos.col);

                    let step = match key {
                        Key::Digit(d) => {
                            self.buffers[cell].push(char::from(b'0' + d));
                            return;
                        }
                        Key::Plus => {
                            self.buffers[cell].push('+');
                            return;
                        }
                        Key::Minus => {
                            self.buffers[cell].push('-');
                            return;
                        }
                        Key::Dot => {
                            self.buffers[cell].push('.');
                            return;
                        }
                        Key::Imag => {
                            self.buffers[cell].push('i');
                            return;
                        }
                        Key::Clear => {
                            self.buffers[cell].reset();
                            return;
                        }
                        Key::Confirm | Key::Right => focus.forward(),
                        Key::Left => focus.back(),
                        Key::Up => focus.up(),
                        Key::Down => focus.down(),
                        Key::Abort => return,
                    };

                    match step {
                        Step::Moved => self.phase = Phase::EditingCells { focus },
                        Step::ExitStart | Step::ExitTop => {
                            self.phase = Phase::SelectingCols;
                        }
                        Step::ExitEnd | Step::ExitBottom => self.solve(),
                    }
                }

                /// Parses every cell, reduces the matrix, and switches to browsing.
                fn solve(&mut self) {
                    let Dims { rows, cols } = self.dims;

                    let mut matrix = Matrix::filled(rows, cols, Complex::ZERO);
                    for r in 0..rows {
                        for c in 0..cols {
                            matrix[(r, c)] = parse_complex(self.buffers[(r, c)].as_str());
                        }
                    }

                    let solved = rref(&matrix);

                    let mut display = Grid::filled(rows, cols, String::new());
                    for r in 0..rows {
                        for c in 0..cols {
                            display[(r, c)] =
                                format_complex(snap(solved[(r, c)]), GRID_PRECISION);
                        }
                    }
                    debug!(rows, cols, "matrix solved");

                    self.phase = Phase::Solved(SolvedView {
                        grid: solved,
                        display,
                        in_grid: false,
                        cursor: GridCursor::new(rows, cols, CellPos { row: rows - 1, col: 0 }),
                    });
                }

                fn apply_solved(&mut self, key: Key) {
                    if key == Key::Confirm {
                        *self = EditorState::new();
                        return;
                    }
                    if let Phase::Solved(ref mut view) = self.phase {
                        view.apply(key);
                    }
                }
            }

            impl Default for EditorState {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl SolvedView {
                /// Browses the read-only result grid.
                pub fn apply(&mut self, key: Key) {
                    match key {
                        Key::Left => {
                            if self.in_grid {
                                if self.cursor.back() == Step::ExitStart {
                                    self.in_grid = false;
                                }
                            } else {
                                self.in_grid = true;
                                self.cursor.jump_to_end();
                            }
                        }
                        Key::Right => {
                            if self.in_grid && self.cursor.forward() == Step::ExitEnd {
                                self.in_grid = false;
                            }
                        }
                        Key::Up => {
                            if self.in_grid {
                                // Clamped at the top row; Up never leaves the grid.
                                let _ = self.cursor.up();
                            } else {
                                self.in_grid = true;
                            }
                        }
                        Key::Down => {
                            if self.in_grid && self.cursor.down() == Step::ExitBottom {
                                self.in_grid = false;
                            }
                        }
                        _ => {}
                    }
                }
            }

            #[cfg(test)]
            mod tests {
                use super::*;

                fn state_with_dims(rows: u8, cols: u8) -> EditorState {
                    let mut s = EditorState::new();
                    s.apply(Key::Digit(rows));
                    s.apply(Key::Digit(cols));
                    s
                }

                fn focus_of(s: &EditorState) -> CellPos {
                    match &s.phase {
                        Phase::EditingCells { focus } => focus.pos,
                        _ => panic!("not editing cells"),
                    }
                }

                fn solved_view(s: &EditorState) -> &SolvedView {
                    match &s.phase {
                        Phase::Solved(view) => view,
                        _ => panic!("not solved"),
                    }
                }

                #[test]
                fn digits_select_dimensions_and_enter_the_grid() {
                    let s = state_with_dims(2, 3);
                    assert_eq!(s.dims, Dims { rows: 2, cols: 3 });
                    assert_eq!(focus_of(&s), CellPos { row: 0, col: 0 });
                }

                #[test]
                fn zero_is_not_a_valid_dimension() {
                    let mut s = EditorState::new();
                    s.apply(Key::Digit(0));
                    assert!(matches!(s.phase, Phase::SelectingRows));
                }

                #[test]
                fn confirm_skips_a_selector_keeping_its_dimension() {
                    let mut s = EditorState::new();
                    s.apply(Key::Confirm);
                    assert!(matches!(s.phase, Phase::SelectingCols));
                    s.apply(Key::Confirm);
                    assert_eq!(s.dims, Dims { rows: 1, cols: 1 });
                    assert_eq!(focus_of(&s), CellPos { row: 0, col: 0 });
                }

                #[test]
                fn left_from_column_selection_returns_to_rows() {
                    let mut s = EditorState::new();
                    s.apply(Key::Digit(3));
                    s.apply(Key::Left);
                    assert!(matches!(s.phase, Phase::SelectingRows));
                }

                #[test]
                fn typing_fills_the_focused_cell() {
                    let mut s = state_with_dims(1, 2);
                    s.apply(Key::Digit(3));
                    s.apply(Key::Plus);
                    s.apply(Key::Digit(4));
                    s.apply(Key::Imag);
                    assert_eq!(s.buffers[(0, 0)].as_str(), "03+4i");
                    assert_eq!(s.buffers[(0, 1)].as_str(), "0");
                }

                #[test]
                fn clear_resets_the_focused_cell() {
                    let mut s = state_with_dims(1, 1);
                    s.apply(Key::Digit(7));
                    s.apply(Key::Dot);
                    s.apply(Key::Digit(5));
                    s.apply(Key::Clear);
                    assert_eq!(s.buffers[(0, 0)].as_str(), "0");
                }

                #[test]
                fn confirm_walks_the_grid_in_row_major_order() {
                    let mut s = state_with_dims(2, 2);
                    s.apply(Key::Confirm);
                    assert_eq!(focus_of(&s), CellPos { row: 0, col: 1 });
                    s.apply(Key::Confirm);
                    assert_eq!(focus_of(&s), CellPos { row: 1, col: 0 });
                }

                #[test]
                fn confirm_from_the_last_cell_solves() {
                    let mut s = state_with_dims(2, 3);
                    for _ in 0..5 {
                        s.apply(Key::Confirm);
                    }
                    assert_eq!(focus_of(&s), CellPos { row: 1, col: 2 });
                    s.apply(Key::Confirm);
                    assert!(matches!(s.phase, Phase::Solved(_)));
                }

                #[test]
                fn down_from_the_last_row_solves() {
                    let mut s = state_with_dims(2, 2);
                    s.apply(Key::Down);
                    s.apply(Key::Down);
                    assert!(matches!(s.phase, Phase::Solved(_)));
                }

                #[test]
                fn left_from_the_first_cell_returns_to_column_selection() {
                    let mut s = state_with_dims(2, 2);
                    s.apply(Key::Left);
                    assert!(matches!(s.phase, Phase::SelectingCols));
                }

                #[test]
                fn buffers_survive_leaving_and_reentering_the_grid() {
                    let mut s = state_with_dims(1, 1);
                    s.apply(Key::Digit(7));
                    s.apply(Key::Up);
                    assert!(matches!(s.phase, Phase::SelectingCols));
                    s.apply(Key::Confirm);
                    assert_eq!(s.buffers[(0, 0)].as_str(), "07");
                }

                #[test]
                fn solve_formats_the_reduced_grid() {
                    // [[2, 4], [1, 3]] reduces to the identity.
                    let mut s = state_with_dims(2, 2);
                    for d in [2u8, 4, 1, 3] {
                        s.apply(Key::Digit(d));
                        s.apply(Key::Confirm);
                    }
                    let view = solved_view(&s);
                    assert_eq!(view.display[(0, 0)], "1.0");
                    assert_eq!(view.display[(0, 1)], "0");
                    assert_eq!(view.display[(1, 0)], "0");
                    assert_eq!(view.display[(1, 1)], "1.0");
                    assert!(!view.in_grid);
                    assert_eq!(view.cursor.pos, CellPos { row: 1, col: 0 });
                }

                #[test]
                fn solve_handles_complex_entries() {
                    // [[i]] normalizes to [[1]].
                    let mut s = state_with_dims(1, 1);
                    s.apply(Key::Clear);
                    s.apply(Key::Imag);
                    s.apply(Key::Confirm);
                    let view = solved_view(&s);
                    assert_eq!(view.display[(0, 0)], "1.0");
                }

                #[test]
                fn browse_left_enters_at_the_bottom_right() {
                    let mut s = state_with_dims(2, 3);
                    for _ in 0..6 {
                        s.apply(Key::Confirm);
                    }
                    s.apply(Key::Left);
                    let view = solved_view(&s);
                    assert!(view.in_grid);
                    assert_eq!(view.cursor.pos, CellPos { row: 1, col: 2 });
                }

                #[test]
                fn browse_right_past_the_last_cell_leaves_the_grid() {
                    let mut s = state_with_dims(2, 2);
                    for _ in 0..4 {
                        s.apply(Key::Confirm);
                    }
                    s.apply(Key::Left);
                    assert!(solved_view(&s).in_grid);
                    s.apply(Key::Right);
                    assert!(!solved_view(&s).in_grid);
                }

                #[test]
                fn browse_up_enters_and_then_clamps_at_the_top() {
                    let mut s = state_with_dims(2, 2);
                    for _ in 0..4 {
                        s.apply(Key::Confirm);
                    }
                    s.apply(Key::Up);
                    let view = solved_view(&s);
                    assert!(view.in_grid);
                    assert_eq!(view.cursor.pos, CellPos { row: 1, col: 0 });
                    s.apply(Key::Up);
                    assert_eq!(solved_view(&s).cursor.pos, CellPos { row: 0, col: 0 });
                    s.apply(Key::Up);
                    let view = solved_view(&s);
                    assert!(view.in_grid);
                    assert_eq!(view.cursor.pos, CellPos { row: 0, col: 0 });
                }

                #[test]
                fn browse_down_from_the_last_row_exits() {
                    let mut s = state_with_dims(2, 2);
                    for _ in 0..4 {
                        s.apply(Key::Confirm);
                    }
                    s.apply(Key::Up);
                    s.apply(Key::Down);
                    assert!(!solved_view(&s).in_grid);
                }

                #[test]
                fn browse_left_from_the_origin_exits() {
                    let mut s = state_with_dims(2, 2);
                    for _ in 0..4 {
                        s.apply(Key::Confirm);
                    }
                    s.apply(Key::Left);
                    for _ in 0..3 {
                        s.apply(Key::Left);
                    }
                    let view = solved_view(&s);
                    assert!(view.in_grid);
                    assert_eq!(view.cursor.pos, CellPos { row: 0, col: 0 });
                    s.apply(Key::Left);
                    assert!(!solved_view(&s).in_grid);
                }

                #[test]
                fn confirm_after_solving_starts_a_fresh_editor() {
                    let mut s = state_with_dims(2, 2);
                    s.apply(Key::Digit(5));
                    for _ in 0..4 {
                        s.apply(Key::Confirm);
                    }
                    s.apply(Key::Confirm);
                    assert!(matches!(s.phase, Phase::SelectingRows));
                    assert_eq!(s.dims, Dims { rows: 1, cols: 1 });
                    assert_eq!(s.buffers[(0, 0)].as_str(), "0");
                }

                #[test]
                fn abort_exits_from_every_phase() {
                    let mut s = EditorState::new();
                    assert_eq!(s.apply(Key::Abort), Control::Exit);

                    let mut s = EditorState::new();
                    s.apply(Key::Digit(2));
                    assert_eq!(s.apply(Key::Abort), Control::Exit);

                    let mut s = state_with_dims(2, 2);
                    assert_eq!(s.apply(Key::Abort), Control::Exit);

                    let mut s = state_with_dims(1, 1);
                    s.apply(Key::Confirm);
                    assert!(matches!(s.phase, Phase::Solved(_)));
                    assert_eq!(s.apply(Key::Abort), Control::Exit);
                }
            }

    }

}

pub mod ui {
    pub mod grid_view {

            use ratatui::{
                layout::{Alignment, Constraint, Direction, Layout, Rect},
                style::{Color, Modifier, Style},
                text::{Line, Span},
                widgets::{Block, Borders, Paragraph},
            };

            use crate::core::format::{format_complex, DETAIL_PRECISION};
            use crate::core::grid::CellPos;
            use crate::editor::state::{EditorState, Phase};

            pub const CELL_WIDTH: usize = 10;

            /// Full-frame redraw: header, grid, detail readout, footer button and
            /// status bar. Reads the editor state, never mutates it.
            pub fn draw(f: &mut ratatui::Frame, state: &EditorState) {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(1),
                        Constraint::Min(3),
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ])
                    .split(f.area());

                draw_header(f, state, chunks[0]);
                draw_grid(f, state, chunks[1]);
                draw_detail(f, state, chunks[2]);
                draw_footer(f, state, chunks[3]);
                draw_status(f, state, chunks[4]);
            }

            /// The `MATRIX RxC` banner, highlighting the dimension being selected.
            fn draw_header(f: &mut ratatui::Frame, state: &EditorState, area: Rect) {
                let selected = Style::default().add_modifier(Modifier::REVERSED);
                let plain = Style::default();
                let line = Line::from(vec![
                    Span::styled(" MATRIX   ", Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(
                        state.dims.rows.to_string(),
                        if matches!(state.phase, Phase::SelectingRows) {
                            selected
                        } else {
                            plain
                        },
                    ),
                    Span::raw("x"),
                    Span::styled(
                        state.dims.cols.to_string(),
                        if matches!(state.phase, Phase::SelectingCols) {
                            selected
                        } else {
                            plain
                        },
                    ),
                ]);
                f.render_widget(Paragraph::new(line), area);
            }

            fn draw_grid(f: &mut ratatui::Frame, state: &EditorState, area: Rect) {
                let block = Block::default().borders(Borders::ALL);
                let inner = block.inner(area);
                f.render_widget(block, area);

                if inner.width < 4 || inner.height < 1 {
                    return;
                }

                let highlight = match &state.phase {
                    Phase::EditingCells { focus } => Some(focus.pos),
                    Phase::Solved(view) if view.in_grid => Some(view.cursor.pos),
                    _ => None,
                };

                let mut lines: Vec<Line> = Vec::new();
                for row in 0..state.dims.rows {
                    let mut spans: Vec<Span> = Vec::new();
                    for col in 0..state.dims.cols {
                        if col > 0 {
                            spans.push(Span::styled(
                                "│".to_string(),
                                Style::default().fg(Color::DarkGray),
                            ));
                        }

                        let text = match &state.phase {
                            Phase::Solved(view) => view.display[(row, col)].clone(),
                            _ => state.buffers[(row, col)].as_str().to_string(),
                        };

                        // Truncate to fit the cell
                        let display = if text.len() > CELL_WIDTH {
                            text[..CELL_WIDTH - 1].to_string() + "~"
                        } else {
                            format!("{:^width$}", text, width = CELL_WIDTH)
                        };

                        let style = if highlight == Some(CellPos { row, col }) {
                            Style::default()
                                .bg(Color::Blue)
                                .fg(Color::White)
                                .add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        };
                        spans.push(Span::styled(display, style));
                    }
                    lines.push(Line::from(spans));
                }

                f.render_widget(Paragraph::new(lines), inner);
            }

            /// High-precision readout of the browsed cell, shown only while the
            /// browse cursor is inside the solved grid.
            fn draw_detail(f: &mut ratatui::Frame, state: &EditorState, area: Rect) {
                if let Phase::Solved(view) = &state.phase {
                    if view.in_grid {
                        let value = view.grid[(view.cursor.pos.row, view.cursor.pos.col)];
                        let line = Line::from(Span::styled(
                            format!(" {}", format_complex(value, DETAIL_PRECISION)),
                            Style::default().fg(Color::Yellow),
                        ));
                        f.render_widget(Paragraph::new(line), area);
                    }
                }
            }

            /// The RREF/BACK button, highlighted when it is the active target.
            fn draw_footer(f: &mut ratatui::Frame, state: &EditorState, area: Rect) {
                let (label, active) = match &state.phase {
                    Phase::Solved(view) => ("BACK", !view.in_grid),
                    _ => ("RREF", false),
                };
                let style = if active {
                    Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                let button = Paragraph::new(Line::from(Span::styled(format!(" {} ", label), style)))
                    .alignment(Alignment::Center);
                f.render_widget(button, area);
            }

            fn draw_status(f: &mut ratatui::Frame, state: &EditorState, area: Rect) {
                let help_text = match &state.phase {
                    Phase::SelectingRows => "1-9:rows  Enter:next  Esc:quit",
                    Phase::SelectingCols => "1-9:cols  Left:back  Enter:next  Esc:quit",
                    Phase::EditingCells { .. } => {
                        "0-9 . i + -:type  Arrows:move  Enter:next cell  Del:clear cell  Esc:quit"
                    }
                    Phase::Solved(_) => "Arrows:browse  Enter:new matrix  Esc:quit",
                };
                let status_line = Line::from(vec![Span::styled(
                    format!(" {} ", help_text),
                    Style::default().fg(Color::DarkGray),
                )]);
                f.render_widget(Paragraph::new(status_line), area);
            }

    }

    pub mod terminal {

            use std::io::{self, Stdout};

            use crossterm::{
                event::{read, Event, KeyCode, KeyEvent, KeyModifiers},
                execute,
                terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
            };
            use ratatui::{backend::CrosstermBackend, Terminal};

            use crate::editor::state::{Control, EditorState};
            use crate::input::Key;
            use crate::ui::grid_view;

            pub type RatatuiTerminal = Terminal<CrosstermBackend<Stdout>>;

            pub struct TerminalApp {
                pub terminal: RatatuiTerminal,
            }

            impl TerminalApp {
                pub fn new() -> Result<Self, anyhow::Error> {
                    enable_raw_mode()?;
                    let mut stdout = io::stdout();
                    execute!(stdout, EnterAlternateScreen)?;
                    let backend = CrosstermBackend::new(stdout);
                    Ok(Self {
                        terminal: Terminal::new(backend)?,
                    })
                }

                /// Blocks on key events, feeding each one to the editor and
                /// redrawing the whole frame, until the editor asks to exit.
                pub fn run(&mut self, state: &mut EditorState) -> Result<(), anyhow::Error> {
                    loop {
                        self.terminal.draw(|f| grid_view::draw(f, state))?;

                        match read()? {
                            Event::Key(event) => {
                                if let Some(key) = translate_key(event) {
                                    if state.apply(key) == Control::Exit {
                                        break;
                                    }
                                }
                            }
                            _ => {}
                        }
                    }

                    disable_raw_mode()?;
                    execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
                    self.terminal.show_cursor()?;

                    Ok(())
                }
            }

            /// Maps a terminal key event onto the keypad vocabulary the editor
            /// speaks.
            fn translate_key(event: KeyEvent) -> Option<Key> {
                if event.modifiers.contains(KeyModifiers::CONTROL)
                    && event.code == KeyCode::Char('c')
                {
                    return Some(Key::Abort);
                }
                match event.code {
                    KeyCode::Left => Some(Key::Left),
                    KeyCode::Right => Some(Key::Right),
                    KeyCode::Up => Some(Key::Up),
                    KeyCode::Down => Some(Key::Down),
                    KeyCode::Enter => Some(Key::Confirm),
                    KeyCode::Esc => Some(Key::Abort),
                    KeyCode::Backspace | KeyCode::Delete => Some(Key::Clear),
                    KeyCode::Char(c) => match c {
                        '0'..='9' => Some(Key::Digit(c as u8 - b'0')),
                        '+' => Some(Key::Plus),
                        '-' => Some(Key::Minus),
                        '.' => Some(Key::Dot),
                        'i' => Some(Key::Imag),
                        'q' => Some(Key::Abort),
                        _ => None,
                    },
                    _ => None,
                }
            }


    }

}

fn main() {
    // Logging is opt-in via RUST_LOG and goes to stderr, away from the
    // alternate screen.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = app::main_loop() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
