use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

/// ccdn Command Line Interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario script through the fat-tree simulator
    Run(RunArgs),

    /// Send a Request to a peer over UDP and print the answer
    Send {
        /// Peer address (host:port)
        peer: String,

        /// Content id (16 hex characters)
        content: String,

        /// Minimum version wanted
        #[clap(long, default_value = "0")]
        version: u32,

        /// Timeout in milliseconds
        #[clap(short, long, default_value = "500")]
        timeout: u64,
    },

    /// Answer CMP packets over UDP for a set of held content
    Listen {
        /// Address to bind
        #[clap(short, long, default_value = rust_ccdn_udp::DEFAULT_LISTEN_ADDR)]
        bind: String,

        /// Held content as <content>[:<version>], repeatable
        #[clap(long = "hold")]
        hold: Vec<String>,

        /// Stop after this many packets
        #[clap(short, long)]
        count: Option<usize>,
    },

    /// Describe a fat tree
    Topology {
        /// Switch port count
        #[clap(short, long, default_value = "4")]
        port: u32,

        /// Show where a single host sits
        #[clap(long)]
        host: Option<u32>,

        /// Print JSON instead of text
        #[clap(long)]
        json: bool,
    },
}

/// Options of the `run` subcommand. Flags override the configuration file
/// and `CCDN_*` environment variables.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario script
    scenario: PathBuf,

    /// Configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Switch port count
    #[clap(short, long)]
    port: Option<u32>,

    /// Content FIB entries per switch
    #[clap(long)]
    fib_size: Option<usize>,

    /// Cached contents per host
    #[clap(long)]
    cache_size: Option<usize>,

    /// Serve requests from host caches
    #[clap(long)]
    enable_cache: Option<bool>,

    /// Seconds before a stalled fetch is retried
    #[clap(short, long)]
    timeout: Option<f64>,

    /// Retries before a stalled fetch is abandoned
    #[clap(long)]
    max_retries: Option<u32>,

    /// Task log path
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Random seed
    #[clap(long)]
    seed: Option<u64>,

    /// Stop after this many simulated seconds
    #[clap(short, long)]
    duration: Option<f64>,

    /// Print the run summary as JSON
    #[clap(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    // Execute the specified command
    match cli.command {
        Commands::Run(args) => {
            commands::run::run_scenario(args).await?;
        }
        Commands::Send { peer, content, version, timeout } => {
            commands::send::send_request(peer, content, version, timeout).await?;
        }
        Commands::Listen { bind, hold, count } => {
            commands::listen::listen(bind, hold, count).await?;
        }
        Commands::Topology { port, host, json } => {
            commands::topology::describe(port, host, json)?;
        }
    }

    Ok(())
}
