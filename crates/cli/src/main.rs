use std::process::ExitCode;

fn main() -> ExitCode {
    pumi_cli::run()
}
