use clap::Subcommand;
use serde_json::json;

use crate::cli::{
    utils::{output_success, output_table},
    OutputFormat,
};
use crate::services::organization_service::{CreateOrganization, OrganizationService};

#[derive(Subcommand)]
pub enum OrgCommands {
    #[command(about = "Create an organization")]
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, help = "Lowercase letters, digits, '-' and '_'")]
        slug: String,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },

    #[command(about = "List organizations")]
    List {
        #[arg(long, help = "Include soft-deleted organizations")]
        all: bool,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}

pub async fn handle(cmd: OrgCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        OrgCommands::Create { name, slug, currency, database_url } => {
            let pool = super::connect(database_url.as_deref()).await?;
            let org = OrganizationService::new(pool)
                .create(CreateOrganization { name, slug, default_currency: currency })
                .await?;
            output_success(
                output_format,
                &format!("Created organization '{}' ({})", org.slug, org.id),
                Some(json!({ "organization": org })),
            )
        }
        OrgCommands::List { all, database_url } => {
            let pool = super::connect(database_url.as_deref()).await?;
            let orgs = OrganizationService::new(pool)
                .list(all)
                .await?;
            let rows = orgs.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
            output_table(
                output_format,
                "organizations",
                &rows,
                &["id", "slug", "name", "default_currency", "is_active", "deleted_at"],
            )
        }
    }
}
