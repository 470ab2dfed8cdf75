//! Fixture: prints one line, then sleeps indefinitely, to exercise the
//! idle-threshold timer independent of any weak-prompt pattern.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, Write};
use std::time::Duration;

fn main() {
    println!("working...");
    io::stdout().flush().ok();
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
