//! `medifind search`

use anyhow::Result;
use clap::Args;
use medifind_core::map::{directions_url, format_distance};
use medifind_core::search::{suggestions, DEFAULT_RADIUS_KM};
use medifind_core::{LatLng, SearchError, SearchRequest};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{connect, load_config};

#[derive(Args)]
pub struct SearchArgs {
    /// Medicine name
    query: String,

    /// Latitude of the search origin
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of the search origin
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    /// Search radius in kilometres
    #[arg(short, long, default_value_t = DEFAULT_RADIUS_KM)]
    radius: f64,

    /// Print the normalized results as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: SearchArgs) -> Result<()> {
    let app = connect(&load_config()?).await?;
    let user = app.auth.snapshot().user;

    let mut request = SearchRequest::new(&args.query).within(args.radius);
    if let (Some(lat), Some(lng)) = (args.lat, args.lng) {
        request = request.near(LatLng::new(lat, lng));
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling search");
            on_interrupt.cancel();
        }
    });

    let outcome = match app.search.search(&request, user.as_ref(), &cancel).await {
        Ok(outcome) => outcome,
        Err(SearchError::Cancelled) => return Ok(()),
        Err(e) => anyhow::bail!(e.user_message()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.stores)?);
        return Ok(());
    }

    println!("{}", outcome.summary());
    if outcome.is_empty() {
        let close = suggestions(&args.query, 3);
        if !close.is_empty() {
            println!("Try: {}", close.join(", "));
        }
        return Ok(());
    }

    for store in &outcome.stores {
        let marker = if store.is_nearest() { " (nearest)" } else { "" };
        let distance = store
            .distance_km
            .map(format_distance)
            .unwrap_or_else(|| "-".to_string());
        let price = store
            .medicine
            .price
            .map(|p| format!("₹{p:.2}"))
            .unwrap_or_else(|| "price n/a".to_string());
        let status = if store.is_open { "open" } else { "closed" };

        println!();
        println!("{}. {}{}", store.rank, store.name, marker);
        println!("   {} | {} | ★ {:.1} | {}", distance, status, store.rating, store.opening_hours);
        println!("   {}", store.full_address);
        println!("   {} {}", store.medicine.name, price);
        println!("   {}", directions_url(LatLng::new(store.latitude, store.longitude)));
    }
    Ok(())
}
