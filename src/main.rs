use std::process::ExitCode;

fn main() -> ExitCode {
    match autopropose::cli::run() {
        Ok(code) => code,
        Err(err) => {
            autopropose::ui::output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
