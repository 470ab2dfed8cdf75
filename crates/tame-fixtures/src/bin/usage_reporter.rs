//! Fixture: prints usage/quota lines matching the built-in usage regex set
//! (spec §3.E), one field update at a time.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

fn main() {
    let lines = [
        "using model: claude-3-opus",
        "Claude messages: 3/40 remaining",
        "tokens used: 12,345",
        "resets in: 3 hours",
    ];
    for line in lines {
        println!("{line}");
        io::stdout().flush().ok();
        thread::sleep(Duration::from_millis(20));
    }
}
