//! Diff probe (C5) — stats and (cache-backed) hashes both sides of a file.

use std::path::Path;

use chrono::{DateTime, Utc};

use syncstation_core::{DiffProbe, Presence};

use crate::hash_cache::HashCache;

/// Probe both `local` and `cloud` absolute paths, returning their tri-state
/// [`Presence`] and whether their content hashes agree.
///
/// Stat/hash failures never propagate as an error here: a missing file is
/// [`Presence::Absent`], any other stat/read failure is
/// [`Presence::Inaccessible`]. This lets the decision engine stay a pure
/// function over the probe's output.
pub fn probe(local: &Path, cloud: &Path, cache: &HashCache) -> DiffProbe {
    let local = presence(local, cache);
    let cloud = presence(cloud, cache);
    let content_equal = match (local.hash(), cloud.hash()) {
        (Some(l), Some(c)) => Some(l == c),
        _ => None,
    };
    DiffProbe {
        local,
        cloud,
        content_equal,
    }
}

fn presence(path: &Path, cache: &HashCache) -> Presence {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime: DateTime<Utc> = meta
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            match cache.get_or_calculate(path) {
                Ok(hash) => Presence::Present { hash, mtime },
                Err(e) => Presence::Inaccessible { why: e.to_string() },
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Presence::Absent,
        Err(e) => Presence::Inaccessible { why: e.to_string() },
    }
}
