use anyhow::Context;
use clap::{Parser, Subcommand};
use cv_gate::config::AppConfig;
use cv_gate::infrastructure::database;
use cv_gate::services::user_service::UserService;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Provision accounts allowed to mint CV tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a user; prompts for the password when not given
    Add {
        username: String,
        #[arg(long)]
        admin: bool,
        #[arg(long, env = "CV_GATE_NEW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// List users and their admin flag
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manage_users=info,cv_gate=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    info!("🔌 Connecting to database...");
    let db = database::setup_database(&config).await?;

    match cli.command {
        Command::Add {
            username,
            admin,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => {
                    let first = rpassword::prompt_password("Password: ")
                        .context("failed to read password")?;
                    let again = rpassword::prompt_password("Repeat password: ")
                        .context("failed to read password")?;
                    if first != again {
                        error!("❌ Passwords do not match.");
                        std::process::exit(1);
                    }
                    first
                }
            };

            match UserService::create_user(&db, &username, &password, admin).await {
                Ok(user) => info!(
                    "✅ Created user {} (admin: {})",
                    user.username, user.is_admin
                ),
                Err(e) => {
                    error!("❌ Could not create user: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::List => {
            for user in UserService::list_users(&db).await? {
                println!(
                    "{}\t{}",
                    user.username,
                    if user.is_admin { "admin" } else { "user" }
                );
            }
        }
    }

    Ok(())
}
