use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils::output_success, OutputFormat};
use crate::types::Role;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a JWT with JWT_SECRET for a user of an organization")]
    Issue {
        #[arg(long, help = "User id (JWT subject)")]
        user: Uuid,
        #[arg(long)]
        organization: Uuid,
        #[arg(long, help = "Employee record of the user, enables self-access to VIP data")]
        employee: Option<Uuid>,
        #[arg(long, value_enum, default_value = "employee")]
        role: Role,
        #[arg(long, help = "Permission such as hris:employees:read; repeatable")]
        permission: Vec<String>,
    },
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { user, organization, employee, role, permission } => {
            let claims = Claims::new(user, organization, employee, role, permission);
            let token = generate_jwt(&claims)?;
            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Token issued",
                    Some(json!({ "token": token, "expires_at": claims.exp })),
                ),
                // bare token so it can be captured by shell scripts
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
