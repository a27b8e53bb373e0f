use std::process::ExitCode;

fn main() -> ExitCode {
    grantbot_cli::run()
}
