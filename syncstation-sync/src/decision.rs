//! Decision engine (C6) — the core three-way sync algorithm.
//!
//! Pure function over the diff probe's output plus the last known-good
//! cloud hash; never touches the filesystem or mutates state.

use chrono::{DateTime, Utc};

use syncstation_core::{DiffProbe, Decision};

/// Decide the action for a single file given its probe and the last
/// recorded cloud hash (from `FileMetadata(item, file).cloud_hash`).
///
/// Rules are applied in order; the first match wins.
pub fn decide(probe: &DiffProbe, last_cloud_hash: Option<&str>) -> Decision {
    let lh = probe.local.hash();
    let ch = probe.cloud.hash();

    // 1. Neither side exists.
    if lh.is_none() && ch.is_none() {
        return Decision::Skip;
    }
    // 2. Cloud absent, local present.
    if lh.is_some() && ch.is_none() {
        return Decision::PushLocalToCloud;
    }
    // 3. Local absent, cloud present.
    if lh.is_none() && ch.is_some() {
        return Decision::PullCloudToLocal;
    }
    // 4. Content identical.
    if lh == ch {
        return Decision::Skip;
    }

    let lm = probe.local.mtime();
    let cm = probe.cloud.mtime();

    match last_cloud_hash {
        // 5. Cloud unchanged since our last sync ⇒ local is the newer side.
        Some(anchor) if Some(anchor) == ch => Decision::PushLocalToCloud,
        // 6. Cloud changed since our last sync.
        Some(_) => match (lm, cm) {
            (Some(lm), Some(cm)) if lm >= cm => {
                Decision::Conflict { reason: "both modified".to_string() }
            }
            _ => Decision::PullCloudToLocal,
        },
        // 7. No anchor: fall back to mtime comparison.
        None => match (lm, cm) {
            (Some(lm), Some(cm)) if lm > cm => Decision::PushLocalToCloud,
            (Some(lm), Some(cm)) if cm > lm => Decision::PullCloudToLocal,
            _ => Decision::Conflict {
                reason: "same timestamp, different content".to_string(),
            },
        },
    }
}

/// Directory-granularity decision: compares tree mtimes only. Equal mtimes
/// with any content drift are reported as a conflict requiring a manual
/// check rather than attempting a per-file merge.
pub fn decide_tree(
    local_mtime: Option<DateTime<Utc>>,
    cloud_mtime: Option<DateTime<Utc>>,
    content_differs: bool,
) -> Decision {
    match (local_mtime, cloud_mtime) {
        (None, None) => Decision::Skip,
        (Some(_), None) => Decision::PushLocalToCloud,
        (None, Some(_)) => Decision::PullCloudToLocal,
        (Some(lm), Some(cm)) if lm > cm => Decision::PushLocalToCloud,
        (Some(lm), Some(cm)) if cm > lm => Decision::PullCloudToLocal,
        _ if content_differs => Decision::Conflict {
            reason: "directory drift — manual check".to_string(),
        },
        _ => Decision::Skip,
    }
}

/// One-way push: mirrors local → cloud regardless of which side is newer,
/// including treating a missing local as "delete from cloud" (the mover is
/// responsible for interpreting a `PushLocalToCloud` decision over an absent
/// local as a deletion).
pub fn decide_push(probe: &DiffProbe) -> Decision {
    if !probe.local.exists() && !probe.cloud.exists() {
        return Decision::Skip;
    }
    Decision::PushLocalToCloud
}

/// One-way pull: the mirror-reverse of [`decide_push`].
pub fn decide_pull(probe: &DiffProbe) -> Decision {
    if !probe.local.exists() && !probe.cloud.exists() {
        return Decision::Skip;
    }
    Decision::PullCloudToLocal
}
