use andro_core::AndroConfig;
use andro_gateway::RelayServer;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod notifier;
mod runtime;

use runtime::{RunOptions, Runtime};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "ANDRO_CONFIG", default_value = "andro.toml")]
    config: PathBuf,

    /// Log as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the creature (default)
    Run(RunArgs),
    /// Run the relay that pairs creatures with remote dashboards
    Relay(RelayArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Replay a JSON-lines sensor trace as the creature's senses
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Start the trace over when it ends
    #[arg(long = "loop", requires = "trace")]
    loop_trace: bool,

    /// Print every rendered frame to stdout as JSON
    #[arg(long)]
    frames: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Ignore stdin
    #[arg(long)]
    no_input: bool,
}

#[derive(Args, Debug)]
struct RelayArgs {
    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let config = AndroConfig::load_or_default(&cli.config);

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            info!("Waking up Andro...");
            let options = RunOptions {
                trace: args.trace,
                loop_trace: args.loop_trace,
                print_frames: args.frames,
                duration: args.duration.map(Duration::from_secs),
                read_stdin: !args.no_input,
            };
            let runtime = Runtime::from_config(&config).await?;
            runtime.run(&config, options).await
        }
        Command::Relay(args) => {
            let host = args.host.unwrap_or_else(|| config.relay.host.clone());
            let port = args.port.unwrap_or(config.relay.port);
            let server = RelayServer::new(config.relay.token.clone());
            let (addr, handle) = server.start(&format!("{}:{}", host, port)).await?;
            println!("Relay online at ws://{}/ws/{{creature|dashboard}}/{{id}}", addr);

            tokio::select! {
                _ = handle => {}
                _ = tokio::signal::ctrl_c() => info!("Relay shutting down"),
            }
            Ok(())
        }
    }
}
