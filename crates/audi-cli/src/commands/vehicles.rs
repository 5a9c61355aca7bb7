//! Vehicle commands - list vehicles, read the status report

use anyhow::{Context, Result};
use audi_client::{AudiClient, VehicleDataResponse};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::output::{FieldRow, OutputContext, VehicleRow};

/// List the vehicles of the account
pub async fn vehicles(client: &AudiClient, ctx: &OutputContext) -> Result<()> {
    let vehicles = client
        .get_vehicles()
        .await
        .context("Failed to list vehicles")?;

    let rows: Vec<VehicleRow> = vehicles
        .into_iter()
        .map(|v| VehicleRow {
            vin: v.vin,
            name: v.nickname.unwrap_or_default(),
            model: v.model.unwrap_or_default(),
            csid: v.csid.unwrap_or_default(),
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}

/// Show the status report of a vehicle
///
/// Requests fresh data from the car unless `stored` is set.
pub async fn status(client: &AudiClient, vin: &str, stored: bool, ctx: &OutputContext) -> Result<()> {
    let report = if stored {
        client
            .get_stored_vehicle_data(vin)
            .await
            .context("Failed to get stored vehicle data")?
    } else {
        let pb = if ctx.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Waiting for vehicle...");

        let result = client.refresh_vehicle_data(vin).await;
        pb.finish_and_clear();
        result.context("Failed to refresh vehicle data")?
    };

    ctx.print(&field_rows(&report));
    Ok(())
}

fn field_rows(report: &VehicleDataResponse) -> Vec<FieldRow> {
    report
        .response
        .vehicle_data
        .data
        .iter()
        .flat_map(|group| {
            group.field.iter().map(move |field| FieldRow {
                group: group.id.clone(),
                field: field.id.clone(),
                value: field.value.clone().unwrap_or_else(|| "-".to_string()),
                unit: field.unit.clone().unwrap_or_default(),
                sent: field.ts_car_sent_utc.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_rows() {
        let report: VehicleDataResponse = serde_json::from_str(
            r#"{"StoredVehicleDataResponse": {"vin": "WAUZZZ", "vehicleData": {"data": [
                {"id": "0x01", "field": [{"id": "0x0101010002", "value": "12345", "unit": "km"}]},
                {"id": "0x02", "field": [{"id": "0x0301030005"}]}
            ]}}}"#,
        )
        .unwrap();

        let rows = field_rows(&report);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].group, "0x01");
        assert_eq!(rows[0].value, "12345");
        assert_eq!(rows[1].value, "-");
    }
}
