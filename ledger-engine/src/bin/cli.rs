//! Ledger command-line client

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ledger_engine::types::{DEFAULT_DECIMALS, MAX_DECIMALS};
use ledger_engine::{AccountId, Amount, Config, Entry, Ledger};
use std::path::PathBuf;

/// First pre-funded development account, used by `demo`
const DEMO_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

#[derive(Parser)]
#[command(name = "ledger-cli")]
#[command(about = "Record credits/debits and inspect the ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (defaults come from LEDGER_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory (nothing survives the process)
    #[arg(long, global = true)]
    in_memory: bool,

    /// Fractional digits used to parse and print amounts
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_DECIMALS,
        value_parser = clap::value_parser!(u32).range(0..=MAX_DECIMALS as i64)
    )]
    decimals: u32,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a credit (default) or a debit
    Record {
        /// Account id (0x + 40 hex digits)
        #[arg(short, long)]
        account: String,

        /// What the entry is for
        #[arg(short = 'm', long)]
        description: String,

        /// Amount in display units, e.g. 10.50 or 10,50
        #[arg(short = 'n', long)]
        amount: String,

        /// Record a debit instead of a credit
        #[arg(long)]
        debit: bool,
    },

    /// Show an account's balance
    Balance {
        /// Account id
        #[arg(short, long)]
        account: String,
    },

    /// Show the number of entries
    Count,

    /// Show one entry
    Read {
        /// Entry index
        #[arg(short, long)]
        index: u64,
    },

    /// Show the latest entries, newest first
    History {
        /// Maximum number of entries
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only this account's entries
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Record an initial credit and a payment, then print the result
    Demo {
        /// Account to use
        #[arg(short, long, default_value = DEMO_ACCOUNT)]
        account: String,
    },

    /// Dump Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let ledger = Ledger::open(config).await.context("failed to open ledger")?;

    let result = run(&cli, &ledger).await;
    ledger.shutdown().await.context("failed to shut down ledger")?;
    result
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::from_env()?,
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if cli.in_memory {
        config.persistence.enabled = false;
    }

    Ok(config)
}

async fn run(cli: &Cli, ledger: &Ledger) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Record {
            account,
            description,
            amount,
            debit,
        } => {
            if description.trim().is_empty() {
                bail!("description must not be empty");
            }
            let account: AccountId = account.parse()?;
            let amount = Amount::parse_units(amount, cli.decimals)?;

            let index = ledger
                .record(account, description.as_str(), amount, !debit)
                .await?;
            print_entry(&ledger.read(index)?, cli)?;
        }

        Commands::Balance { account } => {
            let account: AccountId = account.parse()?;
            let balance = ledger.balance_of(&account);
            if cli.json {
                let value = serde_json::json!({
                    "account": account,
                    "balance": balance,
                    "display": balance.format_units(cli.decimals),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}  {}", account, balance.format_units(cli.decimals));
            }
        }

        Commands::Count => {
            println!("{}", ledger.count());
        }

        Commands::Read { index } => {
            print_entry(&ledger.read(*index)?, cli)?;
        }

        Commands::History { limit, account } => {
            let account: Option<AccountId> =
                account.as_deref().map(str::parse::<AccountId>).transpose()?;
            let entries = history(ledger, *limit, account.as_ref());

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    print_entry(entry, cli)?;
                }
            }
        }

        Commands::Demo { account } => {
            let account: AccountId = account.parse()?;

            println!("Recording initial capital...");
            let capital = Amount::parse_units("5000", cli.decimals)?;
            ledger.record(account, "Initial capital", capital, true).await?;

            println!("Paying supplier...");
            let payment = Amount::parse_units("200", cli.decimals)?;
            ledger.record(account, "Supplier payment", payment, false).await?;

            println!(
                "Final balance for {}: {}",
                account.short(),
                ledger.balance_of(&account).format_units(cli.decimals)
            );
            println!("Entries in ledger: {}", ledger.count());
        }

        Commands::Metrics => {
            print!("{}", ledger.metrics().gather_text()?);
        }
    }

    Ok(())
}

/// Newest-first history, optionally for one account
fn history(ledger: &Ledger, limit: usize, account: Option<&AccountId>) -> Vec<Entry> {
    match account {
        Some(account) => {
            let mut entries = ledger.entries_for(account);
            entries.reverse();
            entries.truncate(limit);
            entries
        }
        None => ledger.recent(limit),
    }
}

fn print_entry(entry: &Entry, cli: &Cli) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        println!(
            "#{:<6} {}  {:<14} {:>24}  {}",
            entry.index,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.account.short(),
            entry.signed_display(cli.decimals),
            entry.description
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OTHER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["ledger-cli", "--in-memory"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_record_rejects_blank_description() {
        let ledger = Ledger::open(Config::in_memory()).await.unwrap();

        let blank = cli(&["record", "-a", DEMO_ACCOUNT, "-m", "  ", "-n", "5"]);
        assert!(run(&blank, &ledger).await.is_err());
        assert_eq!(ledger.count(), 0);

        let ok = cli(&["record", "-a", DEMO_ACCOUNT, "-m", "Initial capital", "-n", "10,5"]);
        run(&ok, &ledger).await.unwrap();
        assert_eq!(ledger.count(), 1);
        let account: AccountId = DEMO_ACCOUNT.parse().unwrap();
        assert_eq!(ledger.balance_of(&account).format_units(DEFAULT_DECIMALS), "10.5");

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_debit_flag_and_rejection() {
        let ledger = Ledger::open(Config::in_memory()).await.unwrap();

        let overdraft = cli(&["record", "-a", OTHER, "-m", "pay", "-n", "1", "--debit"]);
        assert!(run(&overdraft, &ledger).await.is_err());
        assert_eq!(ledger.count(), 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_history_for_account_is_newest_first_and_limited() {
        let ledger = Ledger::open(Config::in_memory()).await.unwrap();
        let owner: AccountId = DEMO_ACCOUNT.parse().unwrap();
        let other: AccountId = OTHER.parse().unwrap();

        for i in 0..5u128 {
            ledger.record(owner, format!("owner-{i}"), Amount::new(i), true).await.unwrap();
            ledger.record(other, format!("other-{i}"), Amount::new(i), true).await.unwrap();
        }

        let entries = history(&ledger, 3, Some(&owner));
        let descriptions: Vec<_> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["owner-4", "owner-3", "owner-2"]);

        let all = history(&ledger, 2, None);
        assert_eq!(all[0].description, "other-4");
        assert_eq!(all[1].description, "owner-4");

        let command = cli(&["history", "--account", DEMO_ACCOUNT, "--limit", "3"]);
        run(&command, &ledger).await.unwrap();

        ledger.shutdown().await.unwrap();
    }

    #[test]
    fn test_decimals_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["ledger-cli", "--decimals", "40", "count"]).is_err());
        let parsed = Cli::try_parse_from(["ledger-cli", "--decimals", "38", "count"]).unwrap();
        assert_eq!(parsed.decimals, MAX_DECIMALS);
    }

    #[tokio::test]
    async fn test_demo_walkthrough() {
        let ledger = Ledger::open(Config::in_memory()).await.unwrap();

        run(&cli(&["demo"]), &ledger).await.unwrap();

        let account: AccountId = DEMO_ACCOUNT.parse().unwrap();
        assert_eq!(ledger.balance_of(&account).format_units(DEFAULT_DECIMALS), "4800.0");
        assert_eq!(ledger.count(), 2);

        ledger.shutdown().await.unwrap();
    }
}
