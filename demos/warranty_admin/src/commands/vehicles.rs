//! Vehicle listing.

use fleetstore_core::{Predicate, QueryOptions, Store, ViewMode};
use fleetstore_testkit::{vehicle_claims, vehicle_customer, vehicle_parts, Vehicle};
use serde::Serialize;
use std::sync::Arc;

/// What to list and how.
#[derive(Debug)]
pub struct ListRequest {
    /// Owner filter.
    pub customer: Option<i64>,
    /// Sort property.
    pub order_by: String,
    /// Sort direction.
    pub ascending: bool,
    /// Page number.
    pub page: i64,
    /// Page size.
    pub size: i64,
}

/// One listed vehicle.
#[derive(Debug, Serialize)]
pub struct VehicleView {
    /// Vehicle ID.
    pub id: String,
    /// Vehicle identification number.
    pub vin: String,
    /// Display name.
    pub name: String,
    /// Owner name, if the owner exists.
    pub owner: Option<String>,
    /// Installed part names.
    pub parts: Vec<String>,
    /// `(report, status)` of each visible claim.
    pub claims: Vec<(String, String)>,
}

/// Listing result.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// Vehicles on the requested page.
    pub vehicles: Vec<VehicleView>,
    /// Matching vehicles before paging.
    pub total_items: u64,
    /// Number of pages at the requested size.
    pub total_pages: u64,
}

/// Runs the vehicles command.
pub fn run(
    store: &Arc<Store>,
    request: &ListRequest,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = store.context();
    let vehicles = ctx.repository::<Vehicle>()?;

    let mut options = QueryOptions::new()
        .include(vehicle_customer())
        .include(vehicle_parts())
        .include(vehicle_claims())
        .order_by(request.order_by.as_str(), request.ascending)
        .page(request.page, request.size)
        .view_mode(ViewMode::IdentityResolved);
    if let Some(owner) = request.customer {
        options = options.filter(Predicate::new(move |v: &Vehicle| v.customer_id == owner));
    }

    let page = vehicles.query(&options)?;
    let result = ListResult {
        total_items: page.total_items,
        total_pages: page.total_pages,
        vehicles: page.items.iter().map(view).collect(),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }
    Ok(())
}

fn view(vehicle: &Vehicle) -> VehicleView {
    VehicleView {
        id: vehicle.id.to_string(),
        vin: vehicle.vin.clone(),
        name: vehicle.vehicle_name.clone(),
        owner: vehicle.customer.as_ref().map(|c| c.name.clone()),
        parts: vehicle.parts.iter().map(|p| p.name.clone()).collect(),
        claims: vehicle
            .warranty_claims
            .iter()
            .map(|c| (c.report.clone(), c.status.clone()))
            .collect(),
    }
}

fn print_text(result: &ListResult) {
    println!(
        "{} vehicle(s), {} page(s)",
        result.total_items, result.total_pages
    );
    for vehicle in &result.vehicles {
        println!();
        println!("{} ({})", vehicle.name, vehicle.vin);
        println!("  Owner:  {}", vehicle.owner.as_deref().unwrap_or("-"));
        if vehicle.parts.is_empty() {
            println!("  Parts:  -");
        } else {
            println!("  Parts:  {}", vehicle.parts.join(", "));
        }
        for (report, status) in &vehicle.claims {
            println!("  Claim:  {report} [{status}]");
        }
    }
}
