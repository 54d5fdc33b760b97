use std::process::ExitCode;

fn main() -> ExitCode {
    stockwatch_worker::run()
}
