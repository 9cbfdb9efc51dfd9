use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "aggrctl",
    about = "Inspect and maintain the aggregation store",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to aggr.toml
    #[arg(short, long, global = true, default_value = "aggr.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the keys of a table
    Keys {
        tier: TierArg,
        table: String,
    },
    /// Print one stored record
    Get {
        tier: TierArg,
        table: String,
        key: String,
    },
    /// Find keys whose indexed value contains a substring
    Search {
        /// Index name, e.g. Model or UUID
        index: String,
        needle: String,
    },
    /// Delete a compute system with its related records and index entries.
    ///
    /// Only the volatile tier is touched; stored device credentials stay.
    DeleteSystem {
        /// Full system URI, e.g. /redfish/v1/Systems/<uuid>.1
        key: String,
    },
    /// Write a starter aggr.toml to the --config path
    InitConfig {
        /// Directory for the durable tier database
        #[arg(short, long, default_value = "/var/lib/aggr")]
        data_dir: String,
        /// Search schema JSON
        #[arg(short, long, default_value = "/etc/aggr/schema.json")]
        schema: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    InMemory,
    OnDisk,
}

impl From<TierArg> for aggr_state::Tier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::InMemory => aggr_state::Tier::InMemory,
            TierArg::OnDisk => aggr_state::Tier::OnDisk,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aggr=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keys { tier, table } => {
            commands::inspect::keys(&cli.config, tier.into(), &table)
        }
        Commands::Get { tier, table, key } => {
            commands::inspect::get(&cli.config, tier.into(), &table, &key)
        }
        Commands::Search { index, needle } => {
            commands::inspect::search(&cli.config, &index, &needle)
        }
        Commands::DeleteSystem { key } => {
            commands::delete::delete_system(&cli.config, &key)
        }
        Commands::InitConfig { data_dir, schema } => {
            commands::init::init_config(&cli.config, &data_dir, &schema)
        }
    }
}
