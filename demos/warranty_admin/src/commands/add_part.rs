//! Part installation inside a retried unit of work.

use fleetstore_core::{CoreError, Store};
use fleetstore_testkit::{vehicle_id, Part, Vehicle};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Runs the add-part command.
///
/// `fail_times` transient failures are injected into the store first, so
/// the commit only succeeds once the retry policy has absorbed them.
pub fn run(
    store: &Arc<Store>,
    vehicle: u128,
    name: &str,
    fail_times: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = store.context();
    let vehicles = ctx.repository::<Vehicle>()?;
    let parts = ctx.repository::<Part>()?;
    let target = vehicle_id(vehicle);

    store.inject_transient_faults(fail_times);

    let mut attempts = 0u32;
    let part = ctx.execute_in_transaction(|| {
        attempts += 1;
        let owner = vehicles
            .get_by_id(target)?
            .ok_or_else(|| CoreError::not_found("vehicles", target.to_string()))?;
        let part = Part {
            id: Uuid::new_v4(),
            serial_number: format!("SN-{:05}", store.row_count("parts") + 1),
            name: name.to_string(),
            vehicle_id: owner.id,
            vehicle: None,
        };
        parts.insert(part)
    })?;

    info!(attempts, part = %part.serial_number, "part installed");
    println!(
        "Installed {} ({}) after {} attempt(s)",
        part.name, part.serial_number, attempts
    );
    println!("Vehicle now has {} part(s)", count_parts(store, target)?);
    Ok(())
}

fn count_parts(store: &Arc<Store>, vehicle: Uuid) -> Result<u64, Box<dyn std::error::Error>> {
    let ctx = store.context();
    let parts = ctx.repository::<Part>()?;
    let matching = fleetstore_core::Predicate::new(move |p: &Part| p.vehicle_id == vehicle);
    Ok(parts.count(Some(&matching))?)
}
