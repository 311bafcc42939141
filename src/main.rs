// src/main.rs

use builddag::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("builddag error: {err:?}");
        std::process::exit(2);
    }

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("builddag error ({:?}): {err}", err.category());
            std::process::exit(2);
        }
    }
}
