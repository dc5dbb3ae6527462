use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    madrecon::cli::main_entry().await
}
