//! Terminal emulator cache (spec §4.H): a `vte`-driven parser over an
//! explicit main/alternate screen pair, exposed through object identity so
//! the alt-screen swap-and-restore round trip is testable by pointer
//! equality rather than by re-diffing cell contents.

pub mod screen;

use std::cell::RefCell;
use std::rc::Rc;

use vte::{Params, Parser, Perform};

use screen::{Screen, ScreenOps};

/// Handle to one of the two screens a [`ScreenController`] owns. Comparing
/// two `ScreenHandle`s with `Rc::ptr_eq` is the identity test spec §8
/// property 8 calls for.
pub type ScreenHandle = Rc<RefCell<Screen>>;

/// Which of the two buffers is currently receiving parser output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ActiveBuffer {
    Main,
    Alt,
}

/// Owns a main screen and an alternate screen, and routes parsed VT events
/// to whichever is active. Entering/leaving the alternate screen (DECSET/
/// DECRST 47, 1047, 1049) swaps a pointer; it never copies or reconstructs
/// either screen.
pub struct ScreenController {
    main: ScreenHandle,
    alt: ScreenHandle,
    active: ActiveBuffer,
    parser: Parser,
    saved_cursor: Option<(usize, usize)>,
}

impl ScreenController {
    /// Create a controller with both screens at the given dimensions.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            main: Rc::new(RefCell::new(Screen::new(rows, cols))),
            alt: Rc::new(RefCell::new(Screen::new(rows, cols))),
            active: ActiveBuffer::Main,
            parser: Parser::new(),
            saved_cursor: None,
        }
    }

    /// Feed raw PTY bytes through the VT parser, mutating whichever screen
    /// is currently active.
    pub fn feed(&mut self, bytes: &[u8]) {
        let mut handler = Handler { controller: self };
        let mut local_parser = std::mem::replace(&mut handler.controller.parser, Parser::new());
        local_parser.advance(&mut handler, bytes);
        self.parser = local_parser;
    }

    /// The screen currently being drawn to. Stable across reads between
    /// alt-screen swaps: the same [`ScreenHandle`] compares `Rc::ptr_eq`
    /// equal for as long as the controller stays on the same buffer.
    #[must_use]
    pub fn active_screen(&self) -> ScreenHandle {
        match self.active {
            ActiveBuffer::Main => Rc::clone(&self.main),
            ActiveBuffer::Alt => Rc::clone(&self.alt),
        }
    }

    /// Handle to the main screen regardless of which buffer is active.
    #[must_use]
    pub fn main_screen(&self) -> ScreenHandle {
        Rc::clone(&self.main)
    }

    /// Handle to the alternate screen regardless of which buffer is active.
    #[must_use]
    pub fn alt_screen(&self) -> ScreenHandle {
        Rc::clone(&self.alt)
    }

    /// Whether the alternate screen is currently active.
    #[must_use]
    pub fn is_alt_active(&self) -> bool {
        self.active == ActiveBuffer::Alt
    }

    /// Resize both screens to the same new dimensions (a PTY resize applies
    /// regardless of which buffer is showing).
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.main.borrow_mut().resize(rows, cols);
        self.alt.borrow_mut().resize(rows, cols);
    }

    fn enter_alt(&mut self, save_cursor: bool) {
        if save_cursor {
            self.saved_cursor = Some(self.main.borrow().cursor());
        }
        if self.active == ActiveBuffer::Main {
            let (rows, cols) = self.main.borrow().dimensions();
            self.alt.borrow_mut().resize(rows, cols);
            self.alt.borrow_mut().clear();
        }
        self.active = ActiveBuffer::Alt;
    }

    fn leave_alt(&mut self, restore_cursor: bool) {
        self.active = ActiveBuffer::Main;
        if restore_cursor {
            if let Some((row, col)) = self.saved_cursor.take() {
                self.main.borrow_mut().on_cup(row, col);
            }
        }
    }

    /// DECSET/DECRST 1048: save or restore the cursor position on the
    /// currently active screen, without swapping buffers.
    fn save_cursor_only(&mut self) {
        self.saved_cursor = Some(self.current().borrow().cursor());
    }

    fn restore_cursor_only(&mut self) {
        if let Some((row, col)) = self.saved_cursor.take() {
            self.current().borrow_mut().on_cup(row, col);
        }
    }

    fn current(&self) -> ScreenHandle {
        self.active_screen()
    }
}

struct Handler<'a> {
    controller: &'a mut ScreenController,
}

fn csi_param(params: &Params, index: usize, default: u16) -> u16 {
    params
        .iter()
        .nth(index)
        .and_then(|group| group.first().copied())
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

fn csi_params_flat(params: &Params) -> Vec<u16> {
    params.iter().flat_map(|group| group.iter().copied()).collect()
}

fn is_private_mode(intermediates: &[u8], params: &Params, code: u16) -> bool {
    intermediates.first() == Some(&b'?') && params.iter().any(|g| g.first() == Some(&code))
}

impl Perform for Handler<'_> {
    fn print(&mut self, c: char) {
        self.controller.current().borrow_mut().on_print(c);
    }

    fn execute(&mut self, byte: u8) {
        self.controller.current().borrow_mut().on_execute(byte);
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        match action {
            'A' => {
                let n = csi_param(params, 0, 1) as usize;
                self.controller.current().borrow_mut().on_cuu(n);
            }
            'B' => {
                let n = csi_param(params, 0, 1) as usize;
                self.controller.current().borrow_mut().on_cud(n);
            }
            'C' => {
                let n = csi_param(params, 0, 1) as usize;
                self.controller.current().borrow_mut().on_cuf(n);
            }
            'D' => {
                let n = csi_param(params, 0, 1) as usize;
                self.controller.current().borrow_mut().on_cub(n);
            }
            'H' | 'f' => {
                let row = csi_param(params, 0, 1).saturating_sub(1) as usize;
                let col = csi_param(params, 1, 1).saturating_sub(1) as usize;
                self.controller.current().borrow_mut().on_cup(row, col);
            }
            'J' => {
                let mode = csi_param(params, 0, 0);
                self.controller.current().borrow_mut().on_ed(mode);
            }
            'K' => {
                let mode = csi_param(params, 0, 0);
                self.controller.current().borrow_mut().on_el(mode);
            }
            'm' => {
                let flat = csi_params_flat(params);
                self.controller.current().borrow_mut().on_sgr(&flat);
            }
            'h' => {
                if is_private_mode(intermediates, params, 25) {
                    self.controller.current().borrow_mut().set_cursor_visible(true);
                } else if is_private_mode(intermediates, params, 47)
                    || is_private_mode(intermediates, params, 1047)
                {
                    self.controller.enter_alt(false);
                } else if is_private_mode(intermediates, params, 1049) {
                    self.controller.enter_alt(true);
                } else if is_private_mode(intermediates, params, 1048) {
                    self.controller.save_cursor_only();
                }
            }
            'l' => {
                if is_private_mode(intermediates, params, 25) {
                    self.controller.current().borrow_mut().set_cursor_visible(false);
                } else if is_private_mode(intermediates, params, 47)
                    || is_private_mode(intermediates, params, 1047)
                {
                    self.controller.leave_alt(false);
                } else if is_private_mode(intermediates, params, 1049) {
                    self.controller.leave_alt(true);
                } else if is_private_mode(intermediates, params, 1048) {
                    self.controller.restore_cursor_only();
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, byte: u8) {
        // RIS (full reset): ESC c
        if byte == b'c' {
            self.controller.main.borrow_mut().clear();
            self.controller.alt.borrow_mut().clear();
            self.controller.active = ActiveBuffer::Main;
        }
    }
}

pub use screen::{Cell, CellStyle, Color, StyleRun};
