//! Read-only service commands

use anyhow::{Context, Result};
use audi_client::{AudiClient, TripType};

use crate::output::OutputContext;

/// Show the latest trip statistic
pub async fn trips(client: &AudiClient, vin: &str, long_term: bool, ctx: &OutputContext) -> Result<()> {
    let trip_type = if long_term {
        TripType::LongTerm
    } else {
        TripType::ShortTerm
    };

    let trip = client
        .get_latest_trip(vin, trip_type)
        .await
        .context("Failed to get trip data")?;
    ctx.print_value(&trip);
    Ok(())
}

/// Show the battery charger status
pub async fn charger(client: &AudiClient, vin: &str, ctx: &OutputContext) -> Result<()> {
    let status = client
        .get_charger_status(vin)
        .await
        .context("Failed to get charger status")?;
    ctx.print_value(&status.charger);
    Ok(())
}

/// Show the parking position
pub async fn position(client: &AudiClient, vin: &str, ctx: &OutputContext) -> Result<()> {
    let position = client
        .find_vehicle(vin)
        .await
        .context("Failed to get vehicle position")?;
    ctx.print_value(&position);
    Ok(())
}

/// Show the services available for a vehicle
pub async fn operations(client: &AudiClient, vin: &str, ctx: &OutputContext) -> Result<()> {
    let operations = client
        .get_operations(vin)
        .await
        .context("Failed to get operation list")?;
    ctx.print_value(&operations);
    Ok(())
}

/// Show the pairing status
pub async fn pairing(client: &AudiClient, vin: &str, ctx: &OutputContext) -> Result<()> {
    let pairing = client
        .get_pairing_status(vin)
        .await
        .context("Failed to get pairing status")?;
    ctx.print_value(&pairing);
    Ok(())
}

/// Register a push notification subscription
pub async fn push_register(
    client: &AudiClient,
    platform: &str,
    app_id: &str,
    token: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let response = client
        .register_push(platform, app_id, token)
        .await
        .context("Push registration failed")?;

    ctx.success("Push notifications registered");
    if !response.is_null() {
        ctx.print_value(&response);
    }
    Ok(())
}
