//! Churn self-test: load fake data, then check that a sample of keys reads
//! back identically before and after a node leaves and another joins.

use std::collections::BTreeMap;

use bytes::Bytes;
use memring_directory::Directory;
use memring_types::NodeAddr;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

const LAST_NAMES: &[&str] = &[
    "Anderson", "Baker", "Carter", "Diaz", "Evans", "Foster", "Garcia", "Hughes", "Ingram",
    "Jensen", "Keller", "Lopez", "Morgan", "Nguyen", "Owens", "Patel", "Quinn", "Reyes",
    "Schmidt", "Turner", "Underwood", "Vasquez", "Walsh", "Young", "Zimmerman",
];

const SUFFIXES: &[&str] = &["Inc", "LLC", "Ltd", "Group", "PLC", "and Sons"];

/// Parameters of one self-test run.
#[derive(Debug, Clone)]
pub struct SelftestOptions {
    /// Number of keys to load.
    pub keys: usize,
    /// Number of keys to read back at each checkpoint.
    pub sample: usize,
    /// Node removed after the first read.
    pub remove: NodeAddr,
    /// Node added after the second read.
    pub add: NodeAddr,
    /// RNG seed for data and sampling; random if unset.
    pub seed: Option<u64>,
}

type Snapshot = BTreeMap<String, Option<Bytes>>;

/// What each checkpoint read back.
#[derive(Debug)]
pub struct SelftestReport {
    pub before: Snapshot,
    /// `None` when the node to remove was not a member.
    pub after_remove: Option<Snapshot>,
    /// `None` when the node could not be added.
    pub after_add: Option<Snapshot>,
    /// Why the join failed, if it did.
    pub add_error: Option<String>,
}

impl SelftestReport {
    /// All three checkpoints read back the same values.
    pub fn passed(&self) -> bool {
        self.after_remove.as_ref() == Some(&self.before)
            && self.after_add.as_ref() == Some(&self.before)
    }
}

fn pick(rng: &mut StdRng, words: &[&'static str]) -> &'static str {
    words[rng.random_range(0..words.len())]
}

/// A plausible company name.
fn company(rng: &mut StdRng) -> String {
    match rng.random_range(0..3) {
        0 => format!("{} {}", pick(rng, LAST_NAMES), pick(rng, SUFFIXES)),
        1 => format!("{}-{}", pick(rng, LAST_NAMES), pick(rng, LAST_NAMES)),
        _ => format!(
            "{}, {} and {}",
            pick(rng, LAST_NAMES),
            pick(rng, LAST_NAMES),
            pick(rng, LAST_NAMES)
        ),
    }
}

async fn read_sample(directory: &Directory, sample: &[String]) -> anyhow::Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for key in sample {
        snapshot.insert(key.clone(), directory.get(key).await?);
    }
    Ok(snapshot)
}

/// Load data, read a sample, remove a node, read again, add a node, read
/// again.
pub async fn run(
    directory: &Directory,
    opts: &SelftestOptions,
) -> anyhow::Result<SelftestReport> {
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    info!(keys = opts.keys, "loading fake data");
    for i in 0..opts.keys {
        directory.set(&i.to_string(), company(&mut rng)).await?;
    }

    let sample: Vec<String> =
        rand::seq::index::sample(&mut rng, opts.keys, opts.sample.min(opts.keys))
            .into_iter()
            .map(|i| i.to_string())
            .collect();

    let before = read_sample(directory, &sample).await?;

    let after_remove = if directory.contains_node(&opts.remove).await {
        directory.remove_node(&opts.remove).await?;
        Some(read_sample(directory, &sample).await?)
    } else {
        None
    };

    let (after_add, add_error) = match directory.add_node(opts.add.clone()).await {
        Ok(migrated) => {
            info!(node = %opts.add, migrated, "node added");
            (Some(read_sample(directory, &sample).await?), None)
        }
        Err(e) => {
            warn!(node = %opts.add, error = %e, "failed to add node");
            (None, Some(e.to_string()))
        }
    };

    Ok(SelftestReport {
        before,
        after_remove,
        after_add,
        add_error,
    })
}
