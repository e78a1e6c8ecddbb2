//! Warranty domain fixtures and seeded stores.
//!
//! Customers own vehicles; vehicles carry parts, service histories and
//! warranty claims. Navigation fields are `#[serde(skip)]` and filled only
//! by include directives.

use fleetstore_core::{
    Config, DbContext, EntityMetadata, Include, Model, Predicate, Store, Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A vehicle owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer number.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Postal address.
    pub address: Option<String>,
    /// Owned vehicles, filled by [`customer_vehicles`].
    #[serde(skip)]
    pub vehicles: Vec<Arc<Vehicle>>,
}

/// A registered vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Vehicle ID.
    pub id: Uuid,
    /// Vehicle identification number.
    pub vin: String,
    /// Display name.
    pub vehicle_name: String,
    /// Owner.
    pub customer_id: i64,
    /// Owner, filled by [`vehicle_customer`].
    #[serde(skip)]
    pub customer: Option<Arc<Customer>>,
    /// Installed parts, filled by [`vehicle_parts`].
    #[serde(skip)]
    pub parts: Vec<Arc<Part>>,
    /// Service records, filled by [`vehicle_service_histories`].
    #[serde(skip)]
    pub service_histories: Vec<Arc<ServiceHistory>>,
    /// Claims, filled by [`vehicle_claims`].
    #[serde(skip)]
    pub warranty_claims: Vec<Arc<WarrantyClaim>>,
}

/// A part attached to a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Part ID.
    pub id: Uuid,
    /// Manufacturer serial number.
    pub serial_number: String,
    /// Part name.
    pub name: String,
    /// Vehicle the part is installed in.
    pub vehicle_id: Uuid,
    /// Vehicle, filled by [`part_vehicle`].
    #[serde(skip)]
    pub vehicle: Option<Arc<Vehicle>>,
}

/// One service visit. Keyed by vehicle and visit sequence number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceHistory {
    /// Serviced vehicle.
    pub vehicle_id: Uuid,
    /// Visit number, per vehicle.
    pub sequence: i32,
    /// Service date as days since the Unix epoch.
    pub service_date: i64,
    /// Work carried out.
    pub description: String,
    /// Technician name.
    pub technician: String,
}

/// A warranty claim against a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarrantyClaim {
    /// Claim ID.
    pub id: Uuid,
    /// Vehicle claimed against.
    pub vehicle_id: Uuid,
    /// Claim date as days since the Unix epoch.
    pub claim_date: i64,
    /// One of `Sent`, `Pending`, `Accepted`, `Processed`.
    pub status: String,
    /// Customer report.
    pub report: String,
    /// Diagnostic output.
    pub diagnostic_info: String,
    /// Attached images. Stored, but not a mapped property.
    pub image_urls: Vec<String>,
    /// Archived claims are hidden by the default query filter.
    pub archived: bool,
    /// Vehicle, filled by [`claim_vehicle`].
    #[serde(skip)]
    pub vehicle: Option<Arc<Vehicle>>,
}

/// Metadata for [`Customer`].
pub fn customer_metadata() -> EntityMetadata<Customer> {
    EntityMetadata::builder("customers")
        .key("Id", |c: &Customer| &c.id, |c: &mut Customer| &mut c.id)
        .property("Name", |c: &Customer| &c.name, |c: &mut Customer| &mut c.name)
        .property("Phone", |c: &Customer| &c.phone, |c: &mut Customer| &mut c.phone)
        .property("Email", |c: &Customer| &c.email, |c: &mut Customer| &mut c.email)
        .property("Address", |c: &Customer| &c.address, |c: &mut Customer| &mut c.address)
        .build()
}

/// Metadata for [`Vehicle`].
pub fn vehicle_metadata() -> EntityMetadata<Vehicle> {
    EntityMetadata::builder("vehicles")
        .key("Id", |v: &Vehicle| &v.id, |v: &mut Vehicle| &mut v.id)
        .property("VIN", |v: &Vehicle| &v.vin, |v: &mut Vehicle| &mut v.vin)
        .property(
            "VehicleName",
            |v: &Vehicle| &v.vehicle_name,
            |v: &mut Vehicle| &mut v.vehicle_name,
        )
        .property(
            "CustomerId",
            |v: &Vehicle| &v.customer_id,
            |v: &mut Vehicle| &mut v.customer_id,
        )
        .build()
}

/// Metadata for [`Part`].
pub fn part_metadata() -> EntityMetadata<Part> {
    EntityMetadata::builder("parts")
        .key("Id", |p: &Part| &p.id, |p: &mut Part| &mut p.id)
        .property(
            "SerialNumber",
            |p: &Part| &p.serial_number,
            |p: &mut Part| &mut p.serial_number,
        )
        .property("Name", |p: &Part| &p.name, |p: &mut Part| &mut p.name)
        .property("VehicleId", |p: &Part| &p.vehicle_id, |p: &mut Part| &mut p.vehicle_id)
        .build()
}

/// Metadata for [`ServiceHistory`].
pub fn service_history_metadata() -> EntityMetadata<ServiceHistory> {
    EntityMetadata::builder("service_histories")
        .key(
            "VehicleId",
            |s: &ServiceHistory| &s.vehicle_id,
            |s: &mut ServiceHistory| &mut s.vehicle_id,
        )
        .key(
            "Sequence",
            |s: &ServiceHistory| &s.sequence,
            |s: &mut ServiceHistory| &mut s.sequence,
        )
        .property(
            "ServiceDate",
            |s: &ServiceHistory| &s.service_date,
            |s: &mut ServiceHistory| &mut s.service_date,
        )
        .property(
            "Description",
            |s: &ServiceHistory| &s.description,
            |s: &mut ServiceHistory| &mut s.description,
        )
        .property(
            "Technician",
            |s: &ServiceHistory| &s.technician,
            |s: &mut ServiceHistory| &mut s.technician,
        )
        .build()
}

/// Metadata for [`WarrantyClaim`]. Archived claims are filtered out by
/// default.
pub fn warranty_claim_metadata() -> EntityMetadata<WarrantyClaim> {
    EntityMetadata::builder("warranty_claims")
        .key("Id", |w: &WarrantyClaim| &w.id, |w: &mut WarrantyClaim| &mut w.id)
        .property(
            "VehicleId",
            |w: &WarrantyClaim| &w.vehicle_id,
            |w: &mut WarrantyClaim| &mut w.vehicle_id,
        )
        .property(
            "ClaimDate",
            |w: &WarrantyClaim| &w.claim_date,
            |w: &mut WarrantyClaim| &mut w.claim_date,
        )
        .property(
            "Status",
            |w: &WarrantyClaim| &w.status,
            |w: &mut WarrantyClaim| &mut w.status,
        )
        .property(
            "Report",
            |w: &WarrantyClaim| &w.report,
            |w: &mut WarrantyClaim| &mut w.report,
        )
        .property(
            "DiagnosticInfo",
            |w: &WarrantyClaim| &w.diagnostic_info,
            |w: &mut WarrantyClaim| &mut w.diagnostic_info,
        )
        .property(
            "Archived",
            |w: &WarrantyClaim| &w.archived,
            |w: &mut WarrantyClaim| &mut w.archived,
        )
        .query_filter(Predicate::new(|w: &WarrantyClaim| !w.archived))
        .build()
}

/// The full warranty model.
pub fn warranty_model() -> Model {
    Model::builder()
        .entity(customer_metadata())
        .entity(vehicle_metadata())
        .entity(part_metadata())
        .entity(service_history_metadata())
        .entity(warranty_claim_metadata())
        .build()
        .expect("warranty model is valid")
}

/// Loads a customer's vehicles.
pub fn customer_vehicles() -> Include<Customer> {
    Include::collection(
        "Vehicles",
        |c: &Customer, v: &Vehicle| v.customer_id == c.id,
        |c: &mut Customer, vehicles| c.vehicles = vehicles,
    )
}

/// Loads a vehicle's owner.
pub fn vehicle_customer() -> Include<Vehicle> {
    Include::reference(
        "Customer",
        |v: &Vehicle| Value::from(v.customer_id),
        |v: &mut Vehicle, customer| v.customer = customer,
    )
}

/// Loads a vehicle's parts.
pub fn vehicle_parts() -> Include<Vehicle> {
    Include::collection(
        "Parts",
        |v: &Vehicle, p: &Part| p.vehicle_id == v.id,
        |v: &mut Vehicle, parts| v.parts = parts,
    )
}

/// Loads a vehicle's service histories.
pub fn vehicle_service_histories() -> Include<Vehicle> {
    Include::collection(
        "ServiceHistories",
        |v: &Vehicle, s: &ServiceHistory| s.vehicle_id == v.id,
        |v: &mut Vehicle, histories| v.service_histories = histories,
    )
}

/// Loads a vehicle's claims.
pub fn vehicle_claims() -> Include<Vehicle> {
    Include::collection(
        "WarrantyClaims",
        |v: &Vehicle, w: &WarrantyClaim| w.vehicle_id == v.id,
        |v: &mut Vehicle, claims| v.warranty_claims = claims,
    )
}

/// Loads the vehicle a part is installed in.
pub fn part_vehicle() -> Include<Part> {
    Include::reference(
        "Vehicle",
        |p: &Part| Value::from(p.vehicle_id),
        |p: &mut Part, vehicle| p.vehicle = vehicle,
    )
}

/// Loads the vehicle a claim is filed against.
pub fn claim_vehicle() -> Include<WarrantyClaim> {
    Include::reference(
        "Vehicle",
        |w: &WarrantyClaim| Value::from(w.vehicle_id),
        |w: &mut WarrantyClaim, vehicle| w.vehicle = vehicle,
    )
}

/// Deterministic vehicle ID.
pub fn vehicle_id(n: u128) -> Uuid {
    Uuid::from_u128(0x1000 + n)
}

/// Deterministic part ID.
pub fn part_id(n: u128) -> Uuid {
    Uuid::from_u128(0x2000 + n)
}

/// Deterministic claim ID.
pub fn claim_id(n: u128) -> Uuid {
    Uuid::from_u128(0x3000 + n)
}

/// Creates a customer.
pub fn customer(id: i64, name: &str) -> Customer {
    Customer {
        id,
        name: name.to_string(),
        phone: format!("555-{id:04}"),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        address: None,
        vehicles: Vec::new(),
    }
}

/// Creates a vehicle.
pub fn vehicle(n: u128, name: &str, customer_id: i64) -> Vehicle {
    Vehicle {
        id: vehicle_id(n),
        vin: format!("VIN{n:014}"),
        vehicle_name: name.to_string(),
        customer_id,
        ..Vehicle::default()
    }
}

/// Creates a part installed in vehicle `vehicle`.
pub fn part(n: u128, name: &str, vehicle: u128) -> Part {
    Part {
        id: part_id(n),
        serial_number: format!("SN-{n:05}"),
        name: name.to_string(),
        vehicle_id: vehicle_id(vehicle),
        vehicle: None,
    }
}

/// Creates a service record.
pub fn service_history(vehicle: u128, sequence: i32, description: &str) -> ServiceHistory {
    ServiceHistory {
        vehicle_id: vehicle_id(vehicle),
        sequence,
        service_date: 19_000 + i64::from(sequence),
        description: description.to_string(),
        technician: "Sam".to_string(),
    }
}

/// Creates a warranty claim.
pub fn warranty_claim(n: u128, vehicle: u128, status: &str) -> WarrantyClaim {
    WarrantyClaim {
        id: claim_id(n),
        vehicle_id: vehicle_id(vehicle),
        claim_date: 19_500,
        status: status.to_string(),
        report: format!("claim {n}"),
        diagnostic_info: String::new(),
        image_urls: vec![format!("https://img.example.com/{n}.png")],
        archived: false,
        vehicle: None,
    }
}

/// A store over [`warranty_model`].
pub struct TestStore {
    /// The store instance.
    pub store: Arc<Store>,
}

impl TestStore {
    /// Creates an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty store with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            store: Store::open_with_config(warranty_model(), config),
        }
    }

    /// Creates a store holding [`seed`]'s data set.
    pub fn seeded() -> Self {
        let store = Self::new();
        seed(&store.context()).expect("seeding succeeds");
        store
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = Arc<Store>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Inserts the standard data set and saves it.
///
/// - customers 1 to 3: Ada Lovelace, Grace Hopper, Alan Turing
/// - vehicles 1 and 2 owned by customer 1, vehicle 3 by customer 2
/// - parts 1 to 3 in vehicle 1, part 4 in vehicle 2
/// - service visits 1 and 2 for vehicle 1, visit 1 for vehicle 3
/// - claims 1 (`Sent`) and 2 (`Pending`) on vehicle 1, claim 3
///   (`Accepted`, archived) on vehicle 2
pub fn seed(ctx: &DbContext) -> fleetstore_core::CoreResult<usize> {
    ctx.repository::<Customer>()?.insert_range(vec![
        customer(1, "Ada Lovelace"),
        customer(2, "Grace Hopper"),
        customer(3, "Alan Turing"),
    ])?;
    ctx.repository::<Vehicle>()?.insert_range(vec![
        vehicle(1, "Model S", 1),
        vehicle(2, "Leaf", 1),
        vehicle(3, "Ioniq 5", 2),
    ])?;
    ctx.repository::<Part>()?.insert_range(vec![
        part(1, "Battery pack", 1),
        part(2, "Inverter", 1),
        part(3, "Charge port", 1),
        part(4, "Battery pack", 2),
    ])?;
    ctx.repository::<ServiceHistory>()?.insert_range(vec![
        service_history(1, 1, "Tyre rotation"),
        service_history(1, 2, "Brake fluid"),
        service_history(3, 1, "Cabin filter"),
    ])?;

    let mut archived = warranty_claim(3, 2, "Accepted");
    archived.archived = true;
    ctx.repository::<WarrantyClaim>()?.insert_range(vec![
        warranty_claim(1, 1, "Sent"),
        warranty_claim(2, 1, "Pending"),
        archived,
    ])?;

    ctx.save_changes()
}
