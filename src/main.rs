#![allow(clippy::result_large_err)]

use chrono::Utc;
use dotenvy::dotenv;
use expense_buddy::{
    config::{database, settings},
    core::{analytics, forecast, organization, recurring, session::Actor},
    entities::Organization,
    errors::Result,
};
use sea_orm::EntityTrait;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_app_configuration()?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Seed configured organizations
    organization::seed_organizations(&db, &app_config.organizations, &app_config.invites)
        .await
        .inspect_err(|e| error!("Failed to seed organizations: {}", e))?;

    // 6. Materialize due recurring expenses
    let now = Utc::now();
    recurring::process_auto_create(&db, now).await?;

    // 7. Summarize budgets and top vendors per organization
    for org in Organization::find().all(&db).await? {
        let forecasts = forecast::budget_forecasts_at(&db, org.id, now).await?;
        for item in &forecasts {
            let f = &item.forecast;
            if f.alert_triggered {
                warn!(
                    organization = %org.name,
                    budget = %item.budget.name,
                    "Budget at {:.1}% of {:.2} (projected {:.2})",
                    f.percent_used,
                    item.budget.amount,
                    f.projected_spending
                );
            } else {
                info!(
                    organization = %org.name,
                    budget = %item.budget.name,
                    "Budget at {:.1}% of {:.2} (projected {:.2})",
                    f.percent_used,
                    item.budget.amount,
                    f.projected_spending
                );
            }
        }

        let vendors = analytics::vendor_analysis(
            &db,
            &Actor::system(org.id),
            analytics::Timeframe::Last30Days,
            app_config.analytics.vendor_limit,
            now,
        )
        .await?;
        for vendor in vendors {
            info!(
                organization = %org.name,
                vendor = %vendor.key,
                trend = ?vendor.trend,
                "Spent {:.2} over {} expenses in the last 30 days",
                vendor.total_amount,
                vendor.transaction_count
            );
        }
    }

    Ok(())
}
