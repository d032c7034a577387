//! Bikesplit - bike-split physics simulator

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bikesplit")]
#[command(about = "Predict a bike split from rider power over a course profile")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation or a power sweep from the command line
    Cli {
        /// Pass remaining arguments to bikesplit-cli
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Launch the web API and form
    Gui {
        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cli { args }) => {
            let cli_args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            run_cli(&cli_args)
        }
        Some(Commands::Gui { port, host }) => run_gui(port, &host),
        None => run_gui(8080, "0.0.0.0"),
    }
}

fn run_cli(args: &[&str]) -> anyhow::Result<()> {
    let mut full_args = vec!["bikesplit-cli"];
    full_args.extend(args);

    if let Err(e) = bikesplit_cli::run_cli_main(&full_args) {
        eprintln!("CLI error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run_gui(port: u16, host: &str) -> anyhow::Result<()> {
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::runtime::Runtime;

    let rt = Runtime::new()?;
    rt.block_on(async {
        let addr: SocketAddr = format!("{host}:{port}").parse()?;
        let app = bikesplit_gui::create_router();
        println!("listening on http://{addr}");
        tracing::info!(%addr, "server started");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    })
}
