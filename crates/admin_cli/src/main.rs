use std::{error::Error, io::Write};

use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, EngineError, Resolution, Transaction};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
        pub account_id: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Parser, Debug)]
#[command(name = "voltpay_admin")]
#[command(about = "Admin utilities for Voltpay (bootstrap users, reconcile purchases)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./voltpay.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Purchase(Purchase),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create a login together with its account.
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct Purchase {
    #[command(subcommand)]
    command: PurchaseCommand,
}

#[derive(Subcommand, Debug)]
enum PurchaseCommand {
    /// List purchases still waiting for the biller.
    Pending(PendingArgs),
    /// Close a pending purchase after checking it with the biller.
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
struct PendingArgs {
    /// Only purchases older than this many minutes.
    #[arg(long, default_value_t = 10)]
    older_than_mins: i64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Outcome {
    Success,
    Failed,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    #[arg(long)]
    reference: String,
    #[arg(long, value_enum)]
    outcome: Outcome,
    /// Token delivered by the biller, for successful purchases.
    #[arg(long)]
    token: Option<String>,
    #[arg(long, default_value = "resolved by operator")]
    reason: String,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_purchase(tx: &Transaction) {
    println!(
        "{}  {}  {:>10}  {}  {}/{}",
        tx.created_at.format("%Y-%m-%d %H:%M:%S"),
        tx.reference,
        tx.amount_minor,
        tx.status.as_str(),
        tx.provider_id.as_deref().unwrap_or("-"),
        tx.meter_id.as_deref().unwrap_or("-"),
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db.clone()).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            if users::Entity::find_by_id(args.username.clone())
                .one(&db)
                .await?
                .is_some()
            {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let password = prompt_password_twice()?;

            let account = match engine.open_account(&args.email).await {
                Ok(account) => account,
                Err(EngineError::ExistingKey(email)) => {
                    eprintln!("account already exists: {email}");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            };

            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password: Set(password),
                account_id: Set(account.id.clone()),
            };
            users::Entity::insert(user).exec(&db).await?;

            println!("created user: {} (account {})", args.username, account.id);
        }
        Command::Purchase(Purchase {
            command: PurchaseCommand::Pending(args),
        }) => {
            let cutoff = Utc::now() - Duration::minutes(args.older_than_mins);
            let pending = engine.pending_purchases(cutoff).await?;
            if pending.is_empty() {
                println!("no pending purchases");
            }
            for tx in &pending {
                print_purchase(tx);
            }
        }
        Command::Purchase(Purchase {
            command: PurchaseCommand::Resolve(args),
        }) => {
            let resolution = match args.outcome {
                Outcome::Success => Resolution::Succeeded {
                    token: args.token,
                    raw: None,
                },
                Outcome::Failed => Resolution::Failed {
                    reason: args.reason,
                    raw: None,
                },
            };
            match engine
                .resolve_pending_purchase(&args.reference, resolution)
                .await
            {
                Ok(tx) => print_purchase(&tx),
                Err(err @ (EngineError::NotFound(_) | EngineError::InvalidState(_))) => {
                    eprintln!("{err}");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}
