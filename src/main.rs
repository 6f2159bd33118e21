use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use morpheus_launcher_lib::core::pipeline::looks_modded;
use morpheus_launcher_lib::{init_logging, resolve_and_launch, Identity, LaunchOptions};

#[derive(Debug, Parser)]
#[command(name = "morpheus-launcher", disable_version_flag = true)]
struct Cli {
    /// Version to launch: an id, a loader id, `latest` or `snapshot`.
    #[arg(short = 'v', long = "version")]
    version: String,

    #[arg(short = 'n', long = "minecraftUsername")]
    username: String,

    #[arg(short = 't', long = "minecraftToken", default_value = "0")]
    token: String,

    #[arg(
        short = 'u',
        long = "minecraftUUID",
        default_value = "00000000-0000-0000-0000-000000000000"
    )]
    uuid: String,

    /// Treat the version as modded. Defaults to guessing from the version name.
    #[arg(long = "modded", num_args = 0..=1, default_missing_value = "true")]
    modded: Option<bool>,

    /// Launch through `java -cp` instead of an in-process class loader.
    #[arg(long = "classpath")]
    classpath: bool,

    #[arg(long = "gameDir")]
    game_dir: Option<PathBuf>,

    #[arg(long = "startOnFirstThread")]
    start_on_first_thread: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    tracing::info!("Morpheus launcher {} starting...", env!("CARGO_PKG_VERSION"));

    let options = LaunchOptions {
        modded: cli.modded.unwrap_or_else(|| looks_modded(&cli.version)),
        version_token: cli.version,
        use_classpath: cli.classpath,
        game_directory: cli.game_dir,
        start_on_first_thread: cli.start_on_first_thread,
    };
    let identity = Identity::new(cli.username, cli.uuid, cli.token);

    match resolve_and_launch(options, identity).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Launch failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
