//! Fixture: prints a strong confirmation prompt, then echoes the reply.
//! Used to exercise `NEEDS_INPUT` detection and clearing on reply.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, BufRead, Write};

fn main() {
    println!("Do you want to proceed? [y/n]");
    io::stdout().flush().ok();

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).unwrap_or(0) > 0 {
        println!("you said: {}", line.trim());
    }
    io::stdout().flush().ok();
}
