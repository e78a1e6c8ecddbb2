//! Warranty admin
//!
//! Runs repository operations against a seeded in-memory fleet store.
//!
//! # Commands
//!
//! - `vehicles` - List vehicles with their parts and open claims
//! - `add-part` - Install a part inside a retried unit of work
//! - `claims` - Move a batch of claims to a new status

mod commands;

use clap::{Parser, Subcommand};
use fleetstore_testkit::TestStore;
use tracing_subscriber::EnvFilter;

/// Warranty administration over a seeded fleet store.
#[derive(Parser)]
#[command(name = "warranty-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Log key values instead of redacting them
    #[arg(global = true, long)]
    sensitive_logging: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vehicles with their parts and open claims
    Vehicles {
        /// Only vehicles owned by this customer
        #[arg(short, long)]
        customer: Option<i64>,

        /// Sort property, e.g. VehicleName or VIN
        #[arg(long, default_value = "VehicleName")]
        order_by: String,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Page number (1-based, 0 for all)
        #[arg(long, default_value = "0")]
        page: i64,

        /// Page size (0 for all)
        #[arg(long, default_value = "0")]
        size: i64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Install a part inside a retried unit of work
    AddPart {
        /// Vehicle number from the seed data
        #[arg(long)]
        vehicle: u128,

        /// Part name
        #[arg(long)]
        name: String,

        /// Transient store failures to inject before the commit succeeds
        #[arg(long, default_value = "0")]
        fail_times: u32,
    },

    /// Move a batch of claims to a new status
    Claims {
        /// New status
        #[arg(short, long)]
        status: String,

        /// Claim numbers from the seed data
        #[arg(required = true)]
        ids: Vec<u128>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = fleetstore_core::Config::default().sensitive_logging(cli.sensitive_logging);
    let store = TestStore::with_config(config);
    fleetstore_testkit::seed(&store.context())?;

    match cli.command {
        Commands::Vehicles {
            customer,
            order_by,
            desc,
            page,
            size,
            format,
        } => {
            let request = commands::vehicles::ListRequest {
                customer,
                order_by,
                ascending: !desc,
                page,
                size,
            };
            commands::vehicles::run(&store, &request, &format)?;
        }
        Commands::AddPart {
            vehicle,
            name,
            fail_times,
        } => {
            commands::add_part::run(&store, vehicle, &name, fail_times)?;
        }
        Commands::Claims { status, ids } => {
            commands::claims::run(&store, &ids, &status)?;
        }
        Commands::Version => {
            println!("Warranty admin v{}", env!("CARGO_PKG_VERSION"));
            println!("Fleetstore Core v{}", fleetstore_core::VERSION);
        }
    }

    Ok(())
}
