//! Point d'entrée CLI pour calcul-ta

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use calcul_ta::cli::{self, Commands};

/// Charge `.env` (répertoire courant, sinon celui du binaire)
fn load_env() {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Calculer et comparer les surfaces de plancher d'extraits DXF
#[derive(Parser)]
#[command(name = "calcul-ta")]
#[command(author, version)]
#[command(about = "Comparer les surfaces projet / existant et générer visa et tableur")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Compute {
            projet,
            existant,
            floor,
            threshold,
            identity,
            store,
            timeout,
            report,
        } => {
            cli::cmd_compute(
                projet.as_deref(),
                existant.as_deref(),
                floor,
                threshold,
                &identity,
                &store,
                timeout,
                report.as_deref(),
            )
            .await?;
        }
        Commands::Area { input } => {
            info!(input = %input.display(), "Area breakdown");
            cli::cmd_area(&input).await?;
        }
        Commands::Preview {
            file,
            identity,
            store,
        } => {
            cli::cmd_preview(&file, &identity, &store).await?;
        }
        Commands::Download {
            file,
            output,
            identity,
            store,
        } => {
            cli::cmd_download(&file, &output, &identity, &store).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
