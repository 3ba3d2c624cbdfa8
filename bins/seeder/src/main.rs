//! Database seeder for Tally development and testing.
//!
//! Seeds the reference operation types and a demo account. Safe to run
//! repeatedly.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use tally_core::{Cancellation, LedgerError, LedgerOperations};
use tally_db::OperationTypeRepository;
use tally_shared::AppConfig;

/// Document number of the demo account.
const DEMO_DOCUMENT: &str = "12345678900";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("Connecting to database...");
    let db = tally_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    println!("Seeding operation types...");
    let inserted = OperationTypeRepository::new(db.clone())
        .seed_defaults()
        .await?;
    println!("  {inserted} operation type(s) inserted");

    println!("Seeding demo account...");
    let ledger = tally_db::ledger_service(&db);
    match LedgerOperations::create_account(&ledger, &Cancellation::new(), DEMO_DOCUMENT).await {
        Ok(account) => println!("  Created account {} ({})", account.id, DEMO_DOCUMENT),
        Err(LedgerError::DocumentExists(_)) => {
            println!("  Demo account already exists, skipping...");
        }
        Err(e) => return Err(e.into()),
    }

    println!("Seeding complete!");
    Ok(())
}
