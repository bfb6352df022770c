mod args;
mod handlers;
mod paths;
mod views;

pub use args::{Cli, Commands};

use std::sync::Arc;

use anyhow::{Context, Result};
use skein_runtime::Runtime;
use skein_store::SqliteStore;

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();

    let db_path = paths::resolve_store_path(cli.db.as_deref())?;
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open store: {}", db_path.display()))?,
    );
    let runtime = Runtime::new(store);

    match cli.command {
        Commands::Replay { file, turn, user } => {
            handlers::replay(&runtime, &file, &turn, user.as_deref())
        }
        Commands::Tree { turn } => handlers::tree(&runtime, &turn),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
