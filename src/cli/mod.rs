pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hrctl")]
#[command(about = "Operator CLI for the HR/Payroll API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply the embedded database migrations")]
    Migrate {
        #[arg(long, env = "DATABASE_URL", help = "Database URL (defaults to DATABASE_URL)")]
        database_url: Option<String>,
    },

    #[command(about = "Organization management")]
    Org {
        #[command(subcommand)]
        cmd: commands::organization::OrgCommands,
    },

    #[command(about = "Issue signed access tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Check a running server's /health endpoint")]
    Ping {
        #[arg(long, env = "HR_API_URL", default_value = "http://localhost:3000", help = "Server base URL")]
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate { database_url } => commands::migrate::handle(database_url, output_format).await,
        Commands::Org { cmd } => commands::organization::handle(cmd, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
        Commands::Ping { url } => commands::ping::handle(&url, output_format).await,
    }
}
