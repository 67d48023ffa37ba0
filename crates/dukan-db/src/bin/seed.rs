//! # Seed Data Generator
//!
//! Prepares a fresh Dukan POS database: admin user, admin key, default
//! exchange rate and a small sample catalogue.
//!
//! ## Usage
//! ```bash
//! # Defaults: ./dukan.db, admin key "change-me"
//! cargo run -p dukan-db --bin seed
//!
//! # Specify database path and admin key
//! cargo run -p dukan-db --bin seed -- --db ./data/dukan.db --admin-key s3cret
//! ```
//!
//! ## Generated Data
//! - User `admin` (role ADMIN) with the admin key as password
//! - Admin key hash in `settings`
//! - Exchange rate 70 AFN/USD
//! - Groceries and household goods, some with fixed AFN prices
//!
//! Running it again on a seeded database leaves the catalogue and the
//! exchange rate untouched.

use std::env;

use anyhow::Context;
use dukan_core::{Money, UserRole, DEFAULT_EXCHANGE_RATE};
use dukan_db::repository::NewProduct;
use dukan_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// (sku, name, price USD cents, fixed AFN price in pul, cost USD cents, stock)
const CATALOGUE: &[(&str, &str, i64, Option<i64>, i64, i64)] = &[
    ("RICE-SELLA-5KG", "Sella Rice 5kg", 900, None, 700, 40),
    ("RICE-BASMATI-10KG", "Basmati Rice 10kg", 2_200, None, 1_750, 25),
    ("FLOUR-10KG", "Wheat Flour 10kg", 1_100, Some(75_000), 850, 30),
    ("OIL-SUNFLOWER-5L", "Sunflower Oil 5L", 1_000, None, 780, 24),
    ("OIL-GHEE-2KG", "Vegetable Ghee 2kg", 650, None, 480, 18),
    ("SUGAR-5KG", "White Sugar 5kg", 600, Some(42_000), 470, 35),
    ("TEA-GREEN-500G", "Green Tea 500g", 450, None, 300, 50),
    ("TEA-BLACK-500G", "Black Tea 500g", 400, None, 270, 50),
    ("SALT-1KG", "Iodised Salt 1kg", 50, Some(3_500), 30, 100),
    ("CHICKPEA-1KG", "Chickpeas 1kg", 180, None, 120, 60),
    ("LENTIL-RED-1KG", "Red Lentils 1kg", 200, None, 140, 60),
    ("SOAP-BAR-6", "Soap Bars (6 pack)", 300, None, 190, 30),
    ("DETERGENT-3KG", "Washing Powder 3kg", 750, None, 540, 20),
    ("MATCHES-10", "Matches (10 boxes)", 60, Some(4_000), 35, 80),
    ("BATTERY-AA-4", "AA Batteries (4 pack)", 250, None, 150, 4),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./dukan.db");
    let mut admin_key = String::from("change-me");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-key" | "-k" => {
                if i + 1 < args.len() {
                    admin_key = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Dukan POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>         Database file path (default: ./dukan.db)");
                println!("  -k, --admin-key <KEY>   Admin key and password (default: change-me)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {other}"),
        }
        i += 1;
    }

    println!("🌱 Dukan POS Seed Data Generator");
    println!("================================");
    println!("Database: {db_path}");
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Admin user and key
    if db.users().get_by_username("admin").await?.is_none() {
        db.users()
            .create("admin", "Administrator", &admin_key, UserRole::Admin)
            .await?;
        println!("✓ Created user 'admin'");
    } else {
        println!("• User 'admin' already exists");
    }

    if db.settings().has_admin_key().await? {
        println!("• Admin key already set (rotate it through the API)");
    } else {
        db.settings().init_admin_key(&admin_key).await?;
        println!("✓ Admin key set");
    }

    // Catalogue
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {existing} products");
        println!("  Skipping catalogue to avoid duplicates.");
        return Ok(());
    }

    db.settings().set_exchange_rate(DEFAULT_EXCHANGE_RATE, None).await?;
    println!("✓ Exchange rate: {DEFAULT_EXCHANGE_RATE} AFN/USD");

    println!();
    println!("Generating products...");

    let mut generated = 0;
    for &(sku, name, price_cents, price_afn, cost_cents, stock) in CATALOGUE {
        let product = NewProduct {
            sku: sku.to_string(),
            barcode: Some(format!("590{:010}", generated + 1)),
            name: name.to_string(),
            description: None,
            price_usd: Money::from_cents(price_cents),
            price_afn: price_afn.map(Money::from_cents),
            cost_usd: Money::from_cents(cost_cents),
            stock,
            reorder_level: 5,
        };

        if let Err(e) = db.products().insert(product, None).await {
            eprintln!("Failed to insert {sku}: {e}");
            continue;
        }
        generated += 1;
    }

    println!("✓ Generated {generated} products");

    let found = db.products().search("rice", 10).await?;
    println!("  Search 'rice': {} results", found.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
