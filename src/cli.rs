//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::algo_config::AlgoConfig;
use crate::domain::error::{FundbookError, Result};
use crate::domain::fund::{CashFlowDirection, Fund, FundId, FundType};
use crate::domain::repository::FundRepository;
use crate::ports::config_port::ConfigPort;
use crate::ports::document_store::DocumentStore;

pub const DEFAULT_LOG_FILTER: &str = "fundbook=info";

#[derive(Parser, Debug)]
#[command(name = "fundbook", about = "Track fund holdings, profit and cash flow")]
pub struct Cli {
    #[arg(short, long, global = true, default_value = "fundbook.ini")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty fund
    Create {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        /// MANUAL or ALGO; defaults to [fund] default_type
        #[arg(long = "type")]
        fund_type: Option<String>,
    },
    /// Buy units of an instrument for a total cost
    Buy {
        #[arg(long)]
        fund: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        cost: Decimal,
    },
    /// Sell units of an instrument for total proceeds
    Sell {
        #[arg(long)]
        fund: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        proceeds: Decimal,
        #[arg(long)]
        fee: Option<Decimal>,
    },
    /// Record cash moving into or out of a fund
    Cash {
        #[arg(long)]
        fund: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, value_enum)]
        direction: Direction,
    },
    /// Value a holding at a spot price (nothing is saved)
    Mark {
        #[arg(long)]
        fund: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        price: Decimal,
    },
    /// Print a fund with its holdings
    Show {
        #[arg(long)]
        fund: String,
    },
    /// List funds, optionally for one user
    List {
        #[arg(long)]
        user: Option<String>,
    },
    /// Set or remove an instrument's algo trading parameters
    Algo {
        #[command(subcommand)]
        action: AlgoAction,
    },
    /// Delete one fund
    Delete {
        #[arg(long)]
        fund: String,
    },
    /// Delete every fund
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum AlgoAction {
    /// Add or replace the config for one instrument
    Set {
        #[arg(long)]
        fund: String,
        #[arg(long)]
        code: String,
        /// Lot size traded per signal
        #[arg(long)]
        lot: i64,
        #[arg(long)]
        base_price: f64,
        /// Number of bars in the standard deviation window
        #[arg(long)]
        std_dev_range: i32,
        #[arg(long)]
        std_dev_multiplier: f64,
        /// Defaults to lot * base price
        #[arg(long)]
        gross_amount: Option<f64>,
    },
    /// Remove the config for one instrument
    Remove {
        #[arg(long)]
        fund: String,
        #[arg(long)]
        code: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl From<Direction> for CashFlowDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::In => CashFlowDirection::In,
            Direction::Out => CashFlowDirection::Out,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let adapter = match load_config(&cli.config) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(&adapter);

    let default_type = match default_fund_type(&adapter) {
        Ok(t) => t,
        Err(e) => return report(&e),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_store::SqliteStore;

        let store = match SqliteStore::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => return report(&e),
        };
        let repo = FundRepository::new(store);
        match execute(&repo, cli.command, default_type, &mut std::io::stdout()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => report(&e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (default_type, cli.command);
        eprintln!("error: sqlite feature is required");
        ExitCode::from(1u8)
    }
}

fn report(err: &FundbookError) -> ExitCode {
    error!(error = %err, "command failed");
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> std::result::Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// `RUST_LOG` wins over `[log] filter`, which wins over [`DEFAULT_LOG_FILTER`].
pub fn log_filter(config: &dyn ConfigPort) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|f| !f.trim().is_empty())
        .or_else(|| config.get_string("log", "filter"))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn init_logging(config: &dyn ConfigPort) {
    let filter = EnvFilter::try_new(log_filter(config))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A subscriber may already be installed when run() is called more than once.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub fn default_fund_type(config: &dyn ConfigPort) -> Result<FundType> {
    match config.get_string("fund", "default_type") {
        None => Ok(FundType::default()),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| FundbookError::ConfigInvalid {
                section: "fund".into(),
                key: "default_type".into(),
                reason: format!("'{value}' is not MANUAL or ALGO"),
            }),
    }
}

fn load_fund<S: DocumentStore>(repo: &FundRepository<S>, id: &str) -> Result<Fund> {
    repo.find_by_id(&FundId::new(id))?
        .ok_or_else(|| FundbookError::FundNotFound { id: id.to_string() })
}

/// Run one command against a repository, writing human-readable output to `out`.
pub fn execute<S: DocumentStore, W: Write>(
    repo: &FundRepository<S>,
    command: Command,
    default_type: FundType,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Create {
            user,
            name,
            fund_type,
        } => {
            let fund_type: FundType = match fund_type {
                Some(t) => t.parse()?,
                None => default_type,
            };
            let mut fund = Fund::new(user, name, fund_type);
            let id = repo.save(&mut fund)?;
            info!(%id, "fund created");
            writeln!(out, "{id}")?;
        }
        Command::Buy {
            fund,
            code,
            quantity,
            cost,
        } => {
            let mut f = load_fund(repo, &fund)?;
            f.buy_stock(&code, quantity, cost)?;
            repo.save(&mut f)?;
            if let Some(h) = f.holding(&code) {
                write_holding_line(out, &code, h.quantity(), h.gross(), h.price())?;
            }
        }
        Command::Sell {
            fund,
            code,
            quantity,
            proceeds,
            fee,
        } => {
            let mut f = load_fund(repo, &fund)?;
            let realized = f.sell_stock(&code, quantity, proceeds, fee)?;
            repo.save(&mut f)?;
            writeln!(out, "realized {realized}")?;
            if let Some(h) = f.holding(&code) {
                write_holding_line(out, &code, h.quantity(), h.gross(), h.price())?;
            }
        }
        Command::Cash {
            fund,
            amount,
            direction,
        } => {
            let mut f = load_fund(repo, &fund)?;
            f.record_cash_flow(amount, direction.into())?;
            repo.save(&mut f)?;
            writeln!(
                out,
                "cash in {}  cash out {}",
                f.cashin_amount(),
                f.cashout_amount()
            )?;
        }
        Command::Mark { fund, code, price } => {
            let f = load_fund(repo, &fund)?;
            f.mark_spot_price(&code, price)?;
            if let Some(h) = f.holding(&code) {
                writeln!(
                    out,
                    "{code}  market value {}  unrealized {}",
                    h.market_value()?,
                    h.unrealized_profit()?
                )?;
            }
        }
        Command::Show { fund } => {
            let f = load_fund(repo, &fund)?;
            write_fund(out, &f)?;
        }
        Command::List { user } => {
            let funds = match user {
                Some(u) => repo.find_by_user(&u)?,
                None => repo.find_all()?,
            };
            for f in &funds {
                let id = f.id().map(FundId::to_string).unwrap_or_default();
                writeln!(
                    out,
                    "{id}  {}  {}  {}  profit {}",
                    f.user_id(),
                    f.name(),
                    f.fund_type(),
                    f.profit()
                )?;
            }
        }
        Command::Algo { action } => execute_algo(repo, action, out)?,
        Command::Delete { fund } => {
            if !repo.delete(&FundId::new(fund.as_str()))? {
                return Err(FundbookError::FundNotFound { id: fund });
            }
            writeln!(out, "deleted {fund}")?;
        }
        Command::Clear => {
            repo.delete_all()?;
            writeln!(out, "cleared")?;
        }
    }
    Ok(())
}

fn execute_algo<S: DocumentStore, W: Write>(
    repo: &FundRepository<S>,
    action: AlgoAction,
    out: &mut W,
) -> Result<()> {
    match action {
        AlgoAction::Set {
            fund,
            code,
            lot,
            base_price,
            std_dev_range,
            std_dev_multiplier,
            gross_amount,
        } => {
            let mut f = load_fund(repo, &fund)?;
            let gross_amount = gross_amount.unwrap_or(base_price * lot as f64);
            let config = AlgoConfig::new(
                code.as_str(),
                lot,
                base_price,
                std_dev_range,
                std_dev_multiplier,
                gross_amount,
            );
            f.set_algo_config(&code, config.clone());
            repo.save(&mut f)?;
            info!(fund = %fund, code = %code, "algo config set");
            write_algo_line(out, &code, &config)?;
        }
        AlgoAction::Remove { fund, code } => {
            let mut f = load_fund(repo, &fund)?;
            if f.remove_algo_config(&code).is_none() {
                return Err(FundbookError::UnknownAlgoConfig { fund, code });
            }
            repo.save(&mut f)?;
            writeln!(out, "removed algo {code}")?;
        }
    }
    Ok(())
}

fn write_algo_line<W: Write>(out: &mut W, code: &str, config: &AlgoConfig) -> Result<()> {
    writeln!(
        out,
        "algo {code}  lot {}  base {}  window {}  k {}  gross {}",
        config.quantity(),
        config.base_price(),
        config.std_dev_range(),
        config.std_dev_multiplier(),
        config.gross_amount()
    )?;
    Ok(())
}

fn write_holding_line<W: Write>(
    out: &mut W,
    code: &str,
    quantity: i64,
    gross: Decimal,
    price: Option<Decimal>,
) -> Result<()> {
    let price = price.map(|p| p.round_dp(4).to_string()).unwrap_or_else(|| "-".into());
    writeln!(out, "{code}  qty {quantity}  gross {gross}  avg {price}")?;
    Ok(())
}

fn write_fund<W: Write>(out: &mut W, fund: &Fund) -> Result<()> {
    let id = fund.id().map(FundId::to_string).unwrap_or_default();
    let totals = fund.totals();
    writeln!(
        out,
        "{id}  {} ({}, user {})",
        fund.name(),
        fund.fund_type(),
        fund.user_id()
    )?;
    writeln!(
        out,
        "profit {}  net profit {}  cash in {}  cash out {}  updated {}",
        totals.profit,
        totals.net_profit,
        totals.cashin_amount,
        totals.cashout_amount,
        totals.date.to_rfc3339()
    )?;
    for (code, h) in fund.holdings() {
        write_holding_line(out, &code, h.quantity(), h.gross(), h.price())?;
    }
    for (code, config) in fund.algo_configs() {
        write_algo_line(out, &code, &config)?;
    }
    Ok(())
}
