//! Fixture: writes a prompt in two halves with a delay between them, so the
//! two reads a supervisor performs are very likely to land in separate PTY
//! chunks. Used to exercise the partial-tail rescan across chunk
//! boundaries.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, Write};
use std::time::Duration;

fn main() {
    print!("Do you want to pro");
    io::stdout().flush().ok();
    std::thread::sleep(Duration::from_millis(150));
    println!("ceed?");
    io::stdout().flush().ok();
}
