use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weave_core::SiteId;

mod commands;
mod location;

use location::StoreLocation;

/// weave-migrate: move weave snapshots between stores and check them.
#[derive(Parser)]
#[command(name = "weave-migrate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a snapshot into a fresh weave and save it to another store.
    Migrate {
        /// Source store, `json:<path>` or `sqlite:<path>`.
        #[arg(long)]
        from: StoreLocation,

        /// Destination store, `json:<path>` or `sqlite:<path>`.
        #[arg(long)]
        to: StoreLocation,

        /// Site of the replica doing the replay. Overrides `site` in the config file.
        #[arg(long)]
        site: Option<u32>,

        /// TOML file with replica settings.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print atom count, roots, and the version vector of a stored snapshot.
    Inspect {
        store: StoreLocation,
    },

    /// Print the canonical content hash of a JSON document.
    Hash {
        file: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate {
            from,
            to,
            site,
            config,
        } => commands::load_config(config.as_deref(), site.map(SiteId))
            .and_then(|config| commands::migrate(&from, &to, config))
            .map(|report| println!("{report}")),
        Commands::Inspect { store } => commands::inspect(&store).map(|info| print!("{info}")),
        Commands::Hash { file } => commands::hash(&file).map(|hash| println!("{hash}")),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
