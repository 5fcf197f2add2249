use anyhow::Result;
use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use budgetsnap::config::{Config, LOG_ENV};
use budgetsnap::db::Database;
use budgetsnap::run::{self, Invocation};

fn main() -> Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let invocation = Invocation::parse(&args);
    let config = Config::from_env()?;
    let mut db = Database::open(&config.db_path)?;
    run::as_cli(&invocation, &mut db, &config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "budgetsnap=debug,info"
        } else {
            "budgetsnap=info,warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}
