use assetpipe::cli::{self, Cli};
use assetpipe::logging;
use clap::Parser;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();

    let settings = match cli::load_settings(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&settings.logging) {
        eprintln!("Failed to set up logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = cli::run(args.command(), &settings).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
