use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::api::{self, AppState};
use crate::application::{LedgerService, ScheduleRequest, TransferRequest};
use crate::config::{DEFAULT_DATABASE, ServeConfig};
use crate::domain::{Account, format_minor, format_timestamp, parse_minor};
use crate::features::{self, FeatureFlags, FeatureStore};
use crate::telemetry;

/// Ledgerline - retail-banking ledger service
#[derive(Parser)]
#[command(name = "ledgerline")]
#[command(about = "Account balances, double-entry transfers and scheduled transfer intents")]
#[command(version)]
pub struct Cli {
    /// Database file path or sqlite: URL
    #[arg(short, long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE, global = true)]
    pub database: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init {
        /// Insert the demo accounts
        #[arg(long)]
        seed: bool,
    },

    /// Run the HTTP API
    Serve(ServeConfig),

    /// Open an account
    Open {
        /// Account number (must be unique)
        number: String,

        /// Account holder's display name
        #[arg(short, long)]
        name: String,

        /// Opening balance (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0")]
        balance: String,

        /// Currency code
        #[arg(short, long, default_value = "THB")]
        currency: String,

        #[arg(long, default_value = "")]
        branch: String,

        /// Account type
        #[arg(short = 't', long = "type", default_value = "Savings")]
        account_type: String,
    },

    /// Show balance for an account or all accounts
    Balance {
        /// Account number (omit for all accounts)
        account: Option<String>,
    },

    /// Transfer money between accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account number
        #[arg(long)]
        from: String,

        /// Destination account number
        #[arg(long)]
        to: String,

        /// Destination bank label
        #[arg(long, default_value = "LEDGERLINE")]
        bank: String,

        /// Currency code (defaults to the source account's currency)
        #[arg(short, long)]
        currency: Option<String>,

        #[arg(short, long, default_value = "")]
        note: String,

        /// Reuse the id of an earlier attempt; an already committed transfer is not applied again
        #[arg(long)]
        transaction_id: Option<String>,
    },

    /// List ledger entries, newest first
    Transactions {
        /// Account number (omit for the whole ledger)
        account: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Record a scheduled transfer
    Schedule {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account number
        #[arg(long)]
        from: String,

        /// Destination account number
        #[arg(long)]
        to: String,

        /// Destination bank label
        #[arg(long, default_value = "LEDGERLINE")]
        bank: String,

        /// Currency code (defaults to the source account's currency)
        #[arg(short, long)]
        currency: Option<String>,

        #[arg(short, long, default_value = "")]
        note: String,

        /// ONCE or MONTHLY
        #[arg(short, long, default_value = "ONCE")]
        kind: String,

        /// First run (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        start: String,

        /// Last run for MONTHLY schedules
        #[arg(long)]
        end: Option<String>,
    },

    /// List pending schedules paid from an account
    Schedules {
        account: String,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, balances, full
        export_type: String,

        /// Only this account's statement (transactions only)
        #[arg(short, long)]
        account: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let default_level = match (&self.command, self.verbose) {
            (_, true) => "debug",
            (Commands::Serve(_), false) => "info",
            _ => "warn",
        };
        telemetry::init(self.log_json, default_level);

        match self.command {
            Commands::Init { seed } => {
                let service = LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
                if seed {
                    let seeded = service.seed_demo_data().await?;
                    println!(
                        "Seeded {} demo accounts and {} schedules",
                        seeded.accounts, seeded.schedules
                    );
                }
            }

            Commands::Serve(config) => {
                let service = LedgerService::init(&self.database).await?;
                run_serve_command(service, config).await?;
            }

            Commands::Open {
                number,
                name,
                balance,
                currency,
                branch,
                account_type,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let opening = parse_minor(&balance)
                    .context("Invalid balance format. Use '1000.00' or '1000'")?;
                let account = Account::new(number, name, currency, opening)
                    .with_branch(branch)
                    .with_type(account_type);
                service.open_account(&account).await?;
                println!(
                    "Opened account {} ({}) with {} {}",
                    account.account_number,
                    account.account_name,
                    format_minor(account.balance),
                    account.currency
                );
            }

            Commands::Balance { account } => {
                let service = LedgerService::connect(&self.database).await?;
                run_balance_command(&service, account).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                bank,
                currency,
                note,
                transaction_id,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount =
                    parse_minor(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let currency = resolve_currency(&service, &from, currency).await?;
                let request = TransferRequest {
                    from_account: from,
                    to_account: to,
                    to_bank: bank,
                    amount,
                    currency,
                    note,
                };

                let result = match transaction_id {
                    Some(id) => service.transfer_with_id(&id, &request).await?,
                    None => service.transfer(&request).await?,
                };

                println!(
                    "{} transfer: {} {} -> {} ({}, {})",
                    if result.replayed { "Already recorded" } else { "Recorded" },
                    format_minor(request.amount),
                    request.from_account,
                    request.to_account,
                    result.transaction_id,
                    format_timestamp(result.transferred_at)
                );
            }

            Commands::Transactions { account, limit } => {
                let service = LedgerService::connect(&self.database).await?;
                run_transactions_command(&service, account, limit).await?;
            }

            Commands::Schedule {
                amount,
                from,
                to,
                bank,
                currency,
                note,
                kind,
                start,
                end,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount =
                    parse_minor(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let currency = resolve_currency(&service, &from, currency).await?;
                let request = ScheduleRequest {
                    from_account: from,
                    to_account: to,
                    to_bank: bank,
                    amount,
                    currency,
                    note,
                    schedule: kind.to_uppercase(),
                    start_date: start,
                    end_date: end,
                };

                let result = service.create_schedule(&request).await?;
                println!(
                    "Scheduled {} {} -> {} ({}, {} from {})",
                    format_minor(request.amount),
                    request.from_account,
                    request.to_account,
                    result.schedule_id,
                    result.schedule_type,
                    format_timestamp(result.next_run_date)
                );
            }

            Commands::Schedules { account } => {
                let service = LedgerService::connect(&self.database).await?;
                run_schedules_command(&service, &account).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                account,
                output,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, account.as_deref(), output.as_deref())
                    .await?;
            }
        }

        Ok(())
    }
}

/// Use the given currency, or the source account's when none was given.
async fn resolve_currency(
    service: &LedgerService,
    from: &str,
    currency: Option<String>,
) -> Result<String> {
    match currency {
        Some(currency) => Ok(currency.to_uppercase()),
        None => Ok(service.get_balance(from).await?.currency),
    }
}

async fn run_serve_command(service: LedgerService, config: ServeConfig) -> Result<()> {
    if config.seed {
        let seeded = service.seed_demo_data().await?;
        tracing::info!(
            accounts = seeded.accounts,
            schedules = seeded.schedules,
            "seeded demo data"
        );
    }

    let flags = match &config.features_path {
        Some(path) => features::load_file(path).await.unwrap_or_else(|err| {
            tracing::warn!(error = %format!("{err:#}"), "starting with all feature flags off");
            FeatureFlags::default()
        }),
        None => FeatureFlags::default(),
    };
    tracing::info!(
        schedule_once = flags.enable_schedule_once,
        schedule_monthly = flags.enable_schedule_monthly,
        transfer_limit = flags.transfer_limit.as_deref().unwrap_or("none"),
        "feature flags loaded"
    );
    let store = Arc::new(FeatureStore::new(flags));
    let refresher = config.features_path.clone().map(|path| {
        features::spawn_refresh(store.clone(), path, config.features_refresh())
    });

    let result = api::serve(AppState::new(service.clone(), store), config.addr()).await;

    if let Some(refresher) = refresher {
        refresher.abort();
    }
    service.database().close().await;
    result
}

async fn run_balance_command(service: &LedgerService, account: Option<String>) -> Result<()> {
    match account {
        Some(number) => {
            let account = service.get_balance(&number).await?;
            println!(
                "{} ({}): {} {}",
                account.account_number,
                account.account_name,
                format_minor(account.available_balance),
                account.currency
            );
        }
        None => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<14} {:<20} {:>14} {:<8}",
                    "ACCOUNT", "NAME", "BALANCE", "CURRENCY"
                );
                println!("{}", "-".repeat(59));
                for account in accounts {
                    println!(
                        "{:<14} {:<20} {:>14} {:<8}",
                        account.account_number,
                        truncate(&account.account_name, 20),
                        format_minor(account.available_balance),
                        account.currency
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_transactions_command(
    service: &LedgerService,
    account: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let mut entries = match &account {
        Some(number) => service.list_transactions(number).await?,
        None => service.list_all_transactions().await?,
    };
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if entries.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<28} {:<13} {:<14} {:>12} NOTE",
        "DATE", "TRANSACTION", "TYPE", "ACCOUNT", "AMOUNT"
    );
    println!("{}", "-".repeat(100));
    for entry in &entries {
        println!(
            "{:<20} {:<28} {:<13} {:<14} {:>12} {}",
            format_timestamp(entry.transferred_at),
            entry.transaction_id,
            entry.leg_type,
            entry.account_number,
            format_minor(entry.amount),
            truncate(&entry.note, 30)
        );
    }
    Ok(())
}

async fn run_schedules_command(service: &LedgerService, account: &str) -> Result<()> {
    let schedules = service.list_schedules(account).await?;
    if schedules.is_empty() {
        println!("No pending schedules for {}.", account);
        return Ok(());
    }

    println!(
        "{:<20} {:<28} {:<8} {:<14} {:>12} ENDS",
        "NEXT RUN", "SCHEDULE", "KIND", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(100));
    for schedule in &schedules {
        println!(
            "{:<20} {:<28} {:<8} {:<14} {:>12} {}",
            format_timestamp(schedule.start_date),
            schedule.schedule_id,
            schedule.kind,
            schedule.to_account,
            format_minor(schedule.amount),
            schedule
                .end_date
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!("Entries:      {}", report.entry_count);
    println!("Total held:   {}", format_minor(report.total_balance));
    println!(
        "Ledger net:   {}  {}",
        format_minor(report.net_ledger_total),
        if report.net_ledger_total == 0 {
            "OK"
        } else {
            "UNBALANCED!"
        }
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for violation in &report.violations {
            println!("  - {}", violation);
        }
        for account in &report.unknown_accounts {
            println!("  - entries reference unknown account {}", account);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    account: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let count = exporter.export_transactions_csv(writer, account).await?;
            if output.is_some() {
                eprintln!("Exported {} ledger entries", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} accounts, {} ledger entries",
                    snapshot.accounts.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, balances, full",
                export_type
            );
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long note", 10), "a rathe...");
    }

    #[test]
    fn test_parse_transfer_command() {
        let cli = Cli::try_parse_from([
            "ledgerline",
            "--database",
            "test.db",
            "transfer",
            "200",
            "--from",
            "12345",
            "--to",
            "54321",
            "--transaction-id",
            "TXN1",
        ])
        .unwrap();
        assert_eq!(cli.database, "test.db");
        match cli.command {
            Commands::Transfer {
                amount,
                from,
                transaction_id,
                currency,
                ..
            } => {
                assert_eq!(amount, "200");
                assert_eq!(from, "12345");
                assert_eq!(transaction_id.as_deref(), Some("TXN1"));
                assert!(currency.is_none());
            }
            _ => panic!("expected transfer command"),
        }
    }
}
