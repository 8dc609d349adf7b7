use std::path::PathBuf;

use clap::Parser;

use audit_core::{
    bills::{self, sheets::HttpSheetClient},
    config::{self, NoDecryptor},
    errors::Result,
    init_with_level,
    ledger::{default_http_client, HttpLedgerClient},
    notify::{DedupCache, FileStore, HttpSmsGateway, Notifier, RedisStore},
    time::SystemClock,
};

/// Tracks large scheduled bills on a spreadsheet, reconciles them against
/// ledger repayments, and texts about any that are overdue.
#[derive(Parser)]
#[command(name = "bigbills", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "bigbills.yaml")]
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
    let loaded = config::load_bigbills(&cli.config, &NoDecryptor)?;

    let cache: Box<dyn DedupCache> = match &cli.redis {
        Some(url) => Box::new(RedisStore::open(url)?),
        None => {
            let path = cli
                .store
                .or_else(|| loaded.store.clone())
                .unwrap_or_else(|| config::default_store_path("bigbills"));
            Box::new(FileStore::open(path)?)
        }
    };

    let http = default_http_client()?;
    let sheet = HttpSheetClient::new(http.clone(), loaded.bigbills.credentials.expose());
    let ledger = HttpLedgerClient::new(http.clone(), &loaded.bigbills.transactions);
    let gateway = HttpSmsGateway::new(
        http,
        loaded.notify.sid.expose(),
        loaded.notify.token.expose(),
    );
    let dry_run = cli.dryrun || loaded.dryrun;
    let notifier = Notifier::new(&loaded.notify, &gateway, cache.as_ref(), dry_run);

    let clock = SystemClock;
    let mut schedule = bills::hydrate(&sheet, &loaded.bigbills)?;
    let message = bills::check_late(&mut schedule, &ledger, &sheet, &loaded.bigbills, &clock)?;
    if let Some(message) = message {
        let delivered = notifier.send(&message)?;
        tracing::info!(delivered, "overdue bills notified");
    }
    Ok(())
}
