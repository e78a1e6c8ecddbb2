//! Batch claim status changes.

use fleetstore_core::{BatchOutcome, Store};
use fleetstore_testkit::{claim_id, WarrantyClaim};
use std::sync::Arc;

/// Runs the claims command.
///
/// The batch is all-or-nothing: if any claim is missing or hidden by the
/// archive filter, no claim changes.
pub fn run(
    store: &Arc<Store>,
    ids: &[u128],
    status: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = store.context();
    let claims = ctx.repository::<WarrantyClaim>()?;

    let mut batch = Vec::with_capacity(ids.len());
    for &n in ids {
        let mut claim = claims
            .get_by_id(claim_id(n))?
            .unwrap_or_else(|| WarrantyClaim {
                id: claim_id(n),
                ..WarrantyClaim::default()
            });
        claim.status = status.to_string();
        batch.push(claim);
    }

    match claims.update_range(batch)? {
        BatchOutcome::Updated(updated) => {
            let written = ctx.save_changes()?;
            println!(
                "{} claim(s) set to {status}, {written} row(s) written",
                updated.len()
            );
        }
        BatchOutcome::Rejected { missing } => {
            let keys: Vec<String> = missing.iter().map(|k| k.encode()).collect();
            println!("Batch rejected, missing claim(s): {}", keys.join(", "));
        }
    }
    Ok(())
}
