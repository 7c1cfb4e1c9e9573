//! Key migration on membership changes.
//!
//! Both entry points run after the ring and replica topology have been
//! updated for the change.
//!
//! On join, only the ranges just claimed by the new node can change hands.
//! For each new virtual position, the node owning the next position
//! clockwise is the previous owner of that range; every record tracked
//! under it is re-located, and records whose owner changed are copied to
//! the new owner and its replicas before being deleted from the nodes that
//! held them under the old topology.
//!
//! On leave, the departed node's records go back through the ordinary
//! write path.

use memring_placement::ReplicaTopology;
use memring_types::{KeyRecord, NodeAddr};
use tracing::{debug, info};

use crate::error::{DirectoryError, MembershipChange};
use crate::state::DirectoryState;

/// Migrate the records whose owner changed because `joined` claimed
/// `positions`. `previous` is the replica topology from before the join.
///
/// Returns the number of records migrated.
pub(crate) async fn on_join(
    state: &mut DirectoryState,
    joined: &NodeAddr,
    positions: &[u32],
    previous: &ReplicaTopology,
) -> Result<usize, DirectoryError> {
    let mut migrated = 0usize;

    for &position in positions {
        let Some((_, upper)) = state.ring.successor(position) else {
            continue;
        };
        let upper = upper.clone();

        let records = state.registry.tracked(&upper).to_vec();
        if records.is_empty() {
            continue;
        }
        debug!(%joined, position, %upper, candidates = records.len(), "scanning range");

        for record in records {
            let owner = match state.ring.locate(&record.key) {
                Ok(owner) => owner.clone(),
                Err(e) => {
                    return Err(interrupted(joined, MembershipChange::Join, migrated, e.into()));
                }
            };
            if owner == upper {
                continue;
            }
            if let Err(e) = migrate(state, record, &upper, &owner, previous).await {
                return Err(interrupted(joined, MembershipChange::Join, migrated, e));
            }
            migrated += 1;
        }
    }

    info!(%joined, migrated, "join rebalance complete");
    Ok(migrated)
}

/// Re-write every record the departed node owned through the write path.
///
/// Returns the number of records migrated. On failure the records not yet
/// re-written are handed back in [`DirectoryError::Rebalance`].
pub(crate) async fn on_leave(
    state: &mut DirectoryState,
    departed: &NodeAddr,
    records: Vec<KeyRecord>,
) -> Result<usize, DirectoryError> {
    let mut migrated = 0usize;
    let mut pending = records.into_iter();

    while let Some(record) = pending.next() {
        if let Err(e) = state.set(&record.key, record.value.clone()).await {
            let remaining: Vec<KeyRecord> = std::iter::once(record).chain(pending).collect();
            return Err(DirectoryError::Rebalance {
                node: departed.clone(),
                change: MembershipChange::Leave,
                migrated,
                remaining,
                source: Box::new(e),
            });
        }
        migrated += 1;
    }

    info!(%departed, migrated, "leave rebalance complete");
    Ok(migrated)
}

/// Move one record from `from` to `to`.
///
/// The value is written to `to` and its current replicas first, then
/// deleted from `from` and from `from`'s replicas under `previous`, minus
/// any node that is a current holder. Bookkeeping changes only once all
/// backend calls succeeded.
async fn migrate(
    state: &mut DirectoryState,
    record: KeyRecord,
    from: &NodeAddr,
    to: &NodeAddr,
    previous: &ReplicaTopology,
) -> Result<(), DirectoryError> {
    let holders = state.placement(to);
    let stale: Vec<NodeAddr> = std::iter::once(from)
        .chain(previous.replicas_of(from))
        .filter(|node| !holders.contains(node) && state.registry.contains(node))
        .cloned()
        .collect();

    state.set_on(&holders, &record.key, &record.value).await?;
    state.delete_on(&stale, &record.key).await?;

    debug!(key = %record.key, %from, %to, ?stale, "migrated key");
    state.registry.untrack(from, &record);
    state.registry.track(to, record);
    Ok(())
}

fn interrupted(
    node: &NodeAddr,
    change: MembershipChange,
    migrated: usize,
    source: DirectoryError,
) -> DirectoryError {
    DirectoryError::Rebalance {
        node: node.clone(),
        change,
        migrated,
        remaining: Vec::new(),
        source: Box::new(source),
    }
}
