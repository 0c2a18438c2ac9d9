use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use shopfloor_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::profile::Role,
    services::{
        archival::ArchivalService,
        daily_reports::DailyReportService,
        users::{NewUser, UserService},
    },
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => handle_migrate(&context).await?,
        Commands::DailyReport(args) => handle_daily_report(&context, args, cli.json).await?,
        Commands::Archive(args) => handle_archive(&context, args, cli.json).await?,
        Commands::RegisterUser(args) => handle_register_user(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "shopfloor",
    about = "Maintenance tasks for the shop-floor tracker",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Store the production snapshot of one day
    DailyReport(DailyReportArgs),
    /// Archive completed orders past the retention window
    Archive(ArchiveArgs),
    /// Create a user account with its profile
    RegisterUser(RegisterUserArgs),
}

#[derive(Args)]
struct DailyReportArgs {
    #[arg(long, help = "Day to aggregate as YYYY-MM-DD; defaults to yesterday")]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct ArchiveArgs {
    #[arg(long, help = "Retention in days; defaults to the configured value")]
    retention_days: Option<i64>,
}

#[derive(Args)]
struct RegisterUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
    #[arg(long, default_value = "station", help = "manager or station")]
    role: Role,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn handle_daily_report(context: &CliContext, args: DailyReportArgs, json: bool) -> Result<()> {
    let day = match args.date {
        Some(day) => day,
        None => yesterday()?,
    };

    let report = DailyReportService::new(context.db.clone())
        .generate_daily_report(day)
        .await
        .with_context(|| format!("failed to generate daily report for {}", day))?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Daily report {} • good {} • scrap {} • scrap rate {}% • operators {}",
            report.report_date,
            report.good_quantity,
            report.scrap_quantity,
            report.scrap_rate,
            report.active_operators
        );
    }
    Ok(())
}

async fn handle_archive(context: &CliContext, args: ArchiveArgs, json: bool) -> Result<()> {
    let retention_days = args
        .retention_days
        .unwrap_or(context.config.archive_retention_days);
    info!(retention_days, "Archiving completed work orders");

    let archived = ArchivalService::new(context.db.clone())
        .archive_completed_orders(Utc::now(), retention_days)
        .await
        .context("failed to archive work orders")?;

    if json {
        print_json(&serde_json::json!({
            "archived": archived,
            "retention_days": retention_days,
        }))?;
    } else {
        println!("{} work order(s) archived", archived);
    }
    Ok(())
}

async fn handle_register_user(
    context: &CliContext,
    args: RegisterUserArgs,
    json: bool,
) -> Result<()> {
    let user = UserService::new(context.db.clone())
        .register_user(NewUser {
            username: args.username,
            email: args.email,
            first_name: args.first_name,
            last_name: args.last_name,
            password: args.password,
            role: args.role,
        })
        .await
        .context("failed to register user")?;

    if json {
        print_json(&user)?;
    } else {
        println!("User {} created (id {}, role {})", user.username, user.id, user.role);
    }
    Ok(())
}

fn yesterday() -> Result<NaiveDate> {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .context("date out of range")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
