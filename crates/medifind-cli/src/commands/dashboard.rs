//! `medifind dashboard`

use anyhow::Result;
use medifind_core::dashboard::{CustomerDashboard, RetailerDashboard};

use super::{connect, load_config, require_user};

pub async fn run() -> Result<()> {
    let app = connect(&load_config()?).await?;
    let user = require_user(&app)?;
    let backend = app.backend.as_ref();

    if app.auth.is_retailer() {
        let dashboard = RetailerDashboard::load(backend, &user.id).await?;
        let summary = &dashboard.summary;
        println!("Stores:      {}", summary.total_stores);
        println!("Medicines:   {}", summary.total_medicines);
        println!("Low stock:   {}", summary.low_stock);
        println!("Expired:     {}", summary.expired);

        for store in &dashboard.stores {
            let status = if store.is_open { "open" } else { "closed" };
            println!("\n{} ({status})", store.store_name);
            println!("  {}", store.full_address());
        }

        if !dashboard.low_stock_items.is_empty() {
            println!("\nRunning low:");
            for medicine in &dashboard.low_stock_items {
                println!("  {} ({} left)", medicine.name, medicine.quantity);
            }
        }
        return Ok(());
    }

    let dashboard = CustomerDashboard::load(backend, &user.id).await;
    let stats = &dashboard.stats;
    println!("Searches:          {}", stats.total_searches);
    println!("Favorite stores:   {}", stats.favorite_stores);
    println!("Saved medicines:   {}", stats.favorite_medicines);
    println!("Active alerts:     {}", stats.active_alerts);

    if !dashboard.recent_searches.is_empty() {
        println!("\nRecent searches:");
        for entry in &dashboard.recent_searches {
            println!("  {} ({} results)", entry.query, entry.results_count);
        }
    }

    if !dashboard.favorite_stores.is_empty() {
        println!("\nFavorite stores:");
        for favorite in &dashboard.favorite_stores {
            match &favorite.store {
                Some(store) => println!("  {}, {}", store.store_name, store.city),
                None => println!("  {}", favorite.store_id),
            }
        }
    }

    if !dashboard.favorite_medicines.is_empty() {
        println!("\nSaved medicines:");
        for favorite in &dashboard.favorite_medicines {
            println!("  {}", favorite.medicine_name.as_deref().unwrap_or(&favorite.medicine_id));
        }
    }
    Ok(())
}
