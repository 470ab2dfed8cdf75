//! Fixture: prints a line matching the built-in error patterns, then a
//! harmless follow-up line. Used to exercise `ERROR_SEEN` detection and the
//! last-match-wins rule when an error and a prompt share a chunk.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, Write};

fn main() {
    println!("Error: command not found: pytn");
    io::stdout().flush().ok();
}
