use autodump::alloc::CountingAllocator;
use autodump::init_telemetry;
use autodump::settings::config::Settings;
use autodump::stop_flag;
use tracing::info;

use clap::Parser;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator::system();

#[derive(Parser)]
#[command(name = "autodump")]
#[command(about = "Watch the resource usage of this process and dump snapshots when it looks off")]
#[clap(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser)]
enum Commands {
    /// Show current configuration and exit
    Config,
    /// Run the dump scheduler until interrupted (default)
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new()?;

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Config => {
            println!("{:#?}", &settings);
            return Ok(());
        }
        Commands::Run => {}
    }

    init_telemetry::init_telemetry_and_tracing(&settings)?;

    let handle = autodump::start(settings.dump.clone())?;
    stop_flag::register_signal_handler(&handle.stop_flag());

    handle.wait().await?;
    info!("autodump stopped");

    Ok(())
}
