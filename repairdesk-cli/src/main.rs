//! Main entry point for the RepairDesk command-line client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use dotenv::dotenv;
use shared::{
    config::client::{Config, ConfigFormat},
    models::OrderStatus,
};
use url::Url;

mod commands;
mod telemetry;

/// RepairDesk CLI
#[derive(Parser, Debug)]
#[command(name = "repairdesk")]
#[command(about = "Command-line client for the RepairDesk repair order service", long_about = None)]
struct Cli {
    /// Path to the configuration file (yaml, json or toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// API base URL, overriding the configuration file and environment
    #[arg(long, global = true)]
    base_url: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the RepairDesk CLI
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the session locally
    Login {
        /// Username to sign in with; prompted for when omitted
        #[arg(long, short)]
        username: Option<String>,
    },
    /// Sign out and remove the stored session
    Logout,
    /// Validate the stored session and show the signed-in profile
    Me,
    /// Create a customer account
    Register {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Request a password-reset email
    ForgotPassword {
        #[arg(long, short)]
        email: String,
    },
    /// Set a new password using the uid and token from a reset email
    ResetPassword {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        token: String,
    },
    /// Inspect and manage repair orders
    Orders {
        #[command(subcommand)]
        command: OrdersCommand,
    },
    /// List customer or staff accounts (admin only)
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Generate a configuration file with default values
    Config {
        /// Format of the configuration file to generate
        #[arg(long, short, default_value = "yaml")]
        format: ConfigFormat,

        /// Output path; defaults to `repairdesk.<format>` in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell to generate the completion script for
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum OrdersCommand {
    /// List orders visible to the signed-in account
    List {
        /// Only show orders in this status (e.g. pending, on_going)
        #[arg(long, short)]
        status: Option<OrderStatus>,
    },
    /// Show one order with its items
    Show { id: i64 },
    /// Cancel an order
    Cancel { id: i64 },
    /// Change an order's status (staff only)
    SetStatus { id: i64, status: OrderStatus },
    /// Set an order's total price (staff only)
    SetPrice { id: i64, price: String },
    /// Show order and revenue totals (admin only)
    Report,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// Customer accounts
    Customers,
    /// Staff accounts
    Staff,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            return Ok(());
        }
        Commands::Config { format, output } => {
            return commands::config::generate_config(format, output);
        }
        _ => {}
    }

    let config = Config::load_config(cli.config, cli.base_url)
        .context("failed to load configuration")?;
    telemetry::initialize_tracing(&config)?;
    let app = commands::session::App::connect(&config)?;

    let result = match cli.command {
        Commands::Login { username } => commands::session::login(&app, username).await,
        Commands::Logout => commands::session::logout(&app).await,
        Commands::Me => commands::session::me(&app).await,
        Commands::Register {
            username,
            email,
            phone,
            address,
        } => commands::account::register(&app, username, email, phone, address).await,
        Commands::ForgotPassword { email } => commands::account::forgot_password(&app, &email).await,
        Commands::ResetPassword { uid, token } => {
            commands::account::reset_password(&app, &uid, &token).await
        }
        Commands::Orders { command } => match command {
            OrdersCommand::List { status } => commands::orders::list(&app, status).await,
            OrdersCommand::Show { id } => commands::orders::show(&app, id).await,
            OrdersCommand::Cancel { id } => commands::orders::cancel(&app, id).await,
            OrdersCommand::SetStatus { id, status } => {
                commands::orders::set_status(&app, id, status).await
            }
            OrdersCommand::SetPrice { id, price } => {
                commands::orders::set_price(&app, id, &price).await
            }
            OrdersCommand::Report => commands::orders::report(&app).await,
        },
        Commands::Users { command } => match command {
            UsersCommand::Customers => commands::users::customers(&app).await,
            UsersCommand::Staff => commands::users::staff(&app).await,
        },
        Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
    };

    app.report_session_events();
    result
}
