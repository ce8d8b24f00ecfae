use std::process::exit;

use simply::programs;

fn main() {
    env_logger::init();

    for example in programs::all() {
        for (args, expected) in &example.runs {
            match simply::run_program(&example.program, args) {
                Ok(result) => {
                    let status = if result == *expected { "ok" } else { "MISMATCH" };
                    println!(
                        "{} {:?} = {} (expected {}) {}",
                        example.name, args, result, expected, status
                    );
                }
                Err(err) => {
                    eprintln!("{} {:?} failed: {}", example.name, args, err);
                    exit(1);
                }
            }
        }
    }
}
