use anyhow::Context;
use clap::{Parser, Subcommand};
use cv_gate::client::{Credentials, TokenClient, default_output_path};
use cv_gate::pdf::{ExportConfig, export_pdf};
use dotenvy::dotenv;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Issue CV access tokens and export the CV to PDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a token on the server, then export the CV it unlocks
    CreateToken {
        /// Server root, e.g. http://localhost:5000
        base_url: String,
        /// Name to issue the token for
        token_name: String,
        /// Token lifetime, e.g. "60d" or "2 weeks"
        #[arg(short, long)]
        expiry: Option<String>,
        #[arg(short, long, env = "CV_GATE_USER")]
        user: Option<String>,
        #[arg(short, long, env = "CV_GATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// File name (without .pdf) under pdf/<token_name>/
        #[arg(short, long, conflicts_with = "output")]
        basename: Option<String>,
        /// Explicit output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export any page to PDF with its links preserved
    ExportPdf { url: String, output: PathBuf },
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cvtool=info,cv_gate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let export_config = ExportConfig::from_env();

    match cli.command {
        Command::CreateToken {
            base_url,
            token_name,
            expiry,
            user,
            password,
            basename,
            output,
        } => {
            let username = match user {
                Some(u) => u,
                None => prompt("Username: ")?,
            };
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password: ")
                    .context("failed to read password")?,
            };
            let credentials = Credentials { username, password };

            let client = TokenClient::new(&base_url)?;
            let token_id = client
                .create_token(&token_name, expiry.as_deref(), &credentials)
                .await?;
            let url = client.cv_url(&token_id);
            info!("🔑 Token {} issued for {}", token_id, token_name);
            println!("{}", url);

            let output =
                output.unwrap_or_else(|| default_output_path(&token_name, basename.as_deref()));
            let summary = export_pdf(&export_config, &url, &output).await?;
            println!("{}", summary.output.display());
        }
        Command::ExportPdf { url, output } => {
            let summary = export_pdf(&export_config, &url, &output).await?;
            info!("📄 {} links preserved", summary.links);
            println!("{}", summary.output.display());
        }
    }
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", label)?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    anyhow::ensure!(!value.is_empty(), "a username is required");
    Ok(value)
}
