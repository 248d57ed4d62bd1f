use std::process::ExitCode;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    docqa_cli::logging::init();

    match docqa_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = %e.code, details = ?e.details, "{}", e.message);
            eprintln!("docqa: {e}");
            ExitCode::FAILURE
        }
    }
}
