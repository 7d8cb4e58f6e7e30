use std::process::ExitCode;

use pdftag::{inspect, CancelToken};

/// Debug surface: inspect a PDF file and print the report as JSON.
fn main() -> ExitCode {
    env_logger::init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: pdftag <file.pdf>");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("{}: {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    match inspect(&bytes, &CancelToken::new()) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report).unwrap());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {} ({})", path, err, err.kind());
            ExitCode::FAILURE
        }
    }
}
