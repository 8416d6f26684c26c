use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stratus_core::PlanningOverrides;

mod commands;

#[derive(Parser)]
#[command(
    name = "stratus",
    about = "Stratus: cost-optimal workload placement across cloud providers",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a placement for a service template over a machine catalog.
    ///
    /// Flags override template policies, which override stratus.toml,
    /// which overrides built-in defaults.
    Plan {
        /// Service topology template (YAML)
        template: PathBuf,
        /// Machine catalog (CSV: Provider,Model,RAM,vCPUs,Price,CarbonFootprint)
        catalog: PathBuf,
        /// Search time budget in seconds
        #[arg(short, long)]
        timeout: Option<f64>,
        /// Mirror every workload on each active provider
        #[arg(short, long, num_args = 0..=1, default_missing_value = "true")]
        mirroring: Option<bool>,
        /// Carbon ceiling in gCO2e
        #[arg(short, long)]
        carbon: Option<f64>,
        /// Exact number of providers to activate (0 = at least one)
        #[arg(short = 'n', long)]
        clouds: Option<u32>,
        /// Fixed cost added to every plan
        #[arg(short, long)]
        fixed_cost: Option<f64>,
        /// Activation cost per provider, in catalog order
        #[arg(short = 'C', long, value_delimiter = ',')]
        cluster_cost_per_cloud_provider: Option<Vec<f64>>,
        /// Parallel search workers (default: available cores)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Config file (default: ./stratus.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Scenario label for the report
        #[arg(long)]
        scenario: Option<String>,
        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a machine catalog with model-scaled values
    Catalog {
        /// Machine catalog (CSV)
        path: PathBuf,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run the REST API
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8183")]
        port: u16,
        /// Search workers per request (default: available cores)
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,stratus=debug"))?,
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            template,
            catalog,
            timeout,
            mirroring,
            carbon,
            clouds,
            fixed_cost,
            cluster_cost_per_cloud_provider,
            workers,
            config,
            scenario,
            output,
            format,
        } => commands::plan::run(commands::plan::PlanArgs {
            template,
            catalog,
            overrides: PlanningOverrides {
                time_budget_secs: timeout,
                mirroring,
                max_carbon: carbon,
                target_providers: clouds,
                fixed_cost,
                activation_costs: cluster_cost_per_cloud_provider,
                workers,
            },
            config,
            scenario,
            output,
            format,
        }),
        Commands::Catalog { path, format } => commands::catalog::show(&path, &format),
        Commands::Serve { port, workers } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::serve::run(port, workers))
        }
    }
}
