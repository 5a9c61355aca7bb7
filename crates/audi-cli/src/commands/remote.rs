//! Remote control commands - lock/unlock, climatisation, honk/flash

use anyhow::{Context, Result};
use audi_client::{AudiClient, HeaterSource, HonkFlashMode};
use clap::ValueEnum;

use crate::output::OutputContext;

/// Climatisation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClimateAction {
    Start,
    Stop,
}

/// Heater source selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SourceArg {
    Auxiliary,
    Automatic,
    #[default]
    Electric,
}

impl From<SourceArg> for HeaterSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Auxiliary => HeaterSource::Auxiliary,
            SourceArg::Automatic => HeaterSource::Automatic,
            SourceArg::Electric => HeaterSource::Electric,
        }
    }
}

/// Lock or unlock the vehicle
pub async fn lock(
    client: &AudiClient,
    vin: &str,
    lock: bool,
    pin: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let verb = if lock { "Lock" } else { "Unlock" };
    ctx.info(&format!("Requesting {} for {}...", verb.to_lowercase(), vin));

    let response = if lock {
        client.lock(vin, pin).await
    } else {
        client.unlock(vin, pin).await
    }
    .with_context(|| format!("{} request failed", verb))?;

    let request_id = response.rlu_action_response.request_id;
    let status = client
        .poll_lock_complete(vin, &request_id)
        .await
        .with_context(|| format!("Failed to get {} status", verb.to_lowercase()))?;

    if status.status.is_success() {
        ctx.success(&format!("{} completed", verb));
    } else {
        ctx.warn(&format!("{} request {}: {}", verb, request_id, status.status));
    }
    Ok(())
}

/// Start or stop pre-trip climatisation
pub async fn climate(
    client: &AudiClient,
    vin: &str,
    action: ClimateAction,
    source: SourceArg,
    ctx: &OutputContext,
) -> Result<()> {
    let response = match action {
        ClimateAction::Start => client.start_climate(vin, source.into()).await,
        ClimateAction::Stop => client.stop_climate(vin).await,
    }
    .context("Climatisation request failed")?;

    ctx.success(match action {
        ClimateAction::Start => "Climatisation started",
        ClimateAction::Stop => "Climatisation stopped",
    });
    if !ctx.quiet {
        ctx.print_value(&response);
    }
    Ok(())
}

/// Flash the lights, optionally honking
pub async fn honk_flash(
    client: &AudiClient,
    vin: &str,
    mode: HonkFlashMode,
    seconds: u32,
    ctx: &OutputContext,
) -> Result<()> {
    let action = client
        .honk_flash(vin, mode, seconds)
        .await
        .context("Honk/flash request failed")?;

    ctx.success(&format!(
        "Request {} sent for {}s",
        action.id.as_deref().unwrap_or("-"),
        action.service_duration
    ));
    Ok(())
}
