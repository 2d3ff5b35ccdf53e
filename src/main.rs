use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registry_autologin::registry::ProviderOptions;
use registry_autologin::settings::Settings;

mod cli;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to $AUTOLOGIN_CONFIG, then config/autologin.{toml,yaml})
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Obtain registry credentials for an image from the ambient cloud identity
    Login {
        /// Image reference (e.g., 012345678901.dkr.ecr.us-east-1.amazonaws.com/app:v1)
        image: String,
        /// Enable auto-login to AWS ECR
        #[arg(long)]
        aws_autologin_for_ecr: bool,
        /// Enable auto-login to GCP GCR and Artifact Registry
        #[arg(long)]
        gcp_autologin_for_gcr: bool,
        /// Enable auto-login to Azure ACR
        #[arg(long)]
        azure_autologin_for_acr: bool,
        /// Print the password instead of hiding it
        #[arg(long)]
        show_password: bool,
    },
    /// Show which cloud provider an image is routed to
    Provider {
        /// Image reference
        image: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login {
            image,
            aws_autologin_for_ecr,
            gcp_autologin_for_gcr,
            azure_autologin_for_acr,
            show_password,
        } => {
            let settings = match cli.config.as_deref() {
                Some(path) => Settings::load(Some(path)),
                None => Settings::new(),
            }
            .context("Failed to load settings")?;

            let flags = ProviderOptions {
                aws_auto_login: aws_autologin_for_ecr,
                gcp_auto_login: gcp_autologin_for_gcr,
                azure_auto_login: azure_autologin_for_acr,
            };
            cli::handle_login(&settings, flags, &image, show_password).await
        }
        Commands::Provider { image } => cli::handle_provider(&image),
    }
}
