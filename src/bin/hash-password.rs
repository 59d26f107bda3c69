//! Prints a bcrypt hash for `ADMIN_HASH_PASSWORD`.
//!
//! Usage: `cargo run --bin hash-password <PASSWORD> [COST]`

use bcrypt::{hash, DEFAULT_COST};
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let Some(password) = args.next() else {
        eprintln!("Usage: hash-password <PASSWORD> [COST]");
        return ExitCode::FAILURE;
    };
    let cost = match args.next().map(|c| c.parse::<u32>()) {
        None => DEFAULT_COST,
        Some(Ok(cost)) if (4..=31).contains(&cost) => cost,
        Some(_) => {
            eprintln!("COST must be a number between 4 and 31");
            return ExitCode::FAILURE;
        }
    };

    if password.len() < 8 {
        eprintln!("Warning: passwords shorter than 8 characters are easy to guess");
    }

    match hash(&password, cost) {
        Ok(hashed) => {
            println!("Cost : {}", cost);
            println!("Hash : {}\n", hashed);
            println!("# Add this to the admin's .env:");
            println!("ADMIN_HASH_PASSWORD={}", hashed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            ExitCode::FAILURE
        }
    }
}
