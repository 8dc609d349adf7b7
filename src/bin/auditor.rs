use std::path::PathBuf;

use clap::Parser;

use audit_core::{
    config::{self, NoDecryptor},
    errors::Result,
    init_with_level,
    ledger::{default_http_client, HttpLedgerClient},
    notify::{DedupCache, FileStore, HttpSmsGateway, Notifier, RedisStore},
    runner,
    time::SystemClock,
};

/// Checks configured recurring transactions against the ledger and texts
/// about anything unexpected.
#[derive(Parser)]
#[command(name = "auditor", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "auditor.yaml")]
    config: PathBuf,
    /// Override the notification store location.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Use a redis notification store instead of the local file.
    #[arg(long, value_name = "URL")]
    redis: Option<String>,
    /// Log what would be sent without sending anything.
    #[arg(long)]
    dryrun: bool,
    /// Default log verbosity (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    init_with_level(&cli.log_level);

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let loaded = config::load_auditor(&cli.config, &NoDecryptor)?;

    let cache: Box<dyn DedupCache> = match &cli.redis {
        Some(url) => Box::new(RedisStore::open(url)?),
        None => {
            let path = cli
                .store
                .or_else(|| loaded.store.clone())
                .unwrap_or_else(|| config::default_store_path("auditor"));
            Box::new(FileStore::open(path)?)
        }
    };

    let http = default_http_client()?;
    let ledger = HttpLedgerClient::new(http.clone(), &loaded.backend);
    let gateway = HttpSmsGateway::new(
        http,
        loaded.notify.sid.expose(),
        loaded.notify.token.expose(),
    );
    let dry_run = cli.dryrun || loaded.dryrun;
    let notifier = Notifier::new(&loaded.notify, &gateway, cache.as_ref(), dry_run);

    let report = runner::run_checks(&loaded.checks, &ledger, &notifier, &SystemClock);
    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
