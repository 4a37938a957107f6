//! kforge CLI - compose Kubernetes manifests from components and apply them

use clap::{Parser, Subcommand};
use kforge_core::EnvironmentType;
use kforge_kube::DEFAULT_CONCURRENCY;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;
mod project;

use commands::ProjectArgs;
use error::Result;
use project::ContextOverrides;

#[derive(Parser)]
#[command(name = "kforge")]
#[command(version)]
#[command(about = "Compose Kubernetes manifests from components and apply them safely", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Target cluster version (overrides the project file)
    #[arg(long, global = true, env = "KFORGE_CLUSTER_VERSION")]
    cluster_version: Option<String>,

    /// Target distribution, e.g. kubernetes, k3s, openshift
    #[arg(long, global = true, env = "KFORGE_DISTRIBUTION")]
    distribution: Option<String>,

    /// Environment: test, development, staging or production
    #[arg(long, global = true, env = "KFORGE_ENVIRONMENT")]
    environment: Option<EnvironmentType>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the project's manifests
    Build {
        #[command(flatten)]
        project: ProjectArgs,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what apply would change in the cluster
    Diff {
        #[command(flatten)]
        project: ProjectArgs,

        /// Also show live objects matching this label selector that would be pruned
        #[arg(long)]
        prune_selector: Option<String>,
    },

    /// Apply the project to the cluster
    Apply {
        #[command(flatten)]
        project: ProjectArgs,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Delete live objects matching this label selector that are not in the build
        #[arg(long)]
        prune_selector: Option<String>,

        /// Maximum number of concurrent cluster operations
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = ContextOverrides {
        cluster_version: cli.cluster_version,
        distribution: cli.distribution,
        environment: cli.environment,
    };

    match cli.command {
        Commands::Build { project, output } => {
            commands::build::run(&project, &overrides, output.as_deref())
        }

        Commands::Diff {
            project,
            prune_selector,
        } => commands::diff::run(&project, &overrides, prune_selector).await,

        Commands::Apply {
            project,
            yes,
            prune_selector,
            concurrency,
        } => commands::apply::run(&project, &overrides, yes, prune_selector, concurrency).await,
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
