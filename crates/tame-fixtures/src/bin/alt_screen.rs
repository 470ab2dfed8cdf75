//! Fixture: switches to the alternate screen buffer and back, to exercise
//! full-screen-clear detection in the viewport's mirror fallback.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::io::{self, Read, Write};

fn main() -> io::Result<()> {
    let mut stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = [0u8; 32];

    println!("main screen");
    stdout.flush()?;

    if stdin.read(&mut buffer)? == 0 {
        return Ok(());
    }

    print!("\x1b[?1049h\x1b[2J\x1b[H");
    println!("alternate screen");
    stdout.flush()?;

    if stdin.read(&mut buffer)? == 0 {
        print!("\x1b[?1049l");
        stdout.flush()?;
        return Ok(());
    }

    print!("\x1b[?1049l");
    println!("back to main");
    stdout.flush()?;
    Ok(())
}
