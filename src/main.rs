// src/main.rs

use buildwatch::errors::exit_code;
use buildwatch::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("buildwatch error: {err:?}");
        std::process::exit(exit_code::OTHER);
    }

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("buildwatch error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
