//! Fixture: prints a weak (question-mark-only) prompt and then goes quiet
//! forever, to exercise the weak-prompt timer arming and firing into
//! `NEEDS_INPUT` after the configured timeout.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, Write};
use std::time::Duration;

fn main() {
    println!("What is your name?");
    io::stdout().flush().ok();
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
