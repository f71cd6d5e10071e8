//! FlowOps CLI
//!
//! Validates and test-runs workflow scripts locally against the mocked SDK,
//! without the gateway or any of the storage services.

use flowops_core::cli;
use flowops_core::sandbox::WORKER_STACK_SIZE;
use std::process::ExitCode;
use std::thread;

fn run() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run_cli()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    // `inspect --ast` parses on this thread rather than a sandbox worker
    let cli = thread::Builder::new()
        .name("flowops-cli".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(run);

    match cli.map(|handle| handle.join()) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => {
            eprintln!("Error: CLI thread panicked");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: failed to start CLI thread: {}", e);
            ExitCode::FAILURE
        }
    }
}
