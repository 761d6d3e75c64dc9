// src/ledger.rs
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::model::ItemKind;

/// Bounded record of previously announced item ids, keyed by
/// (tenant, source channel) and split by item kind.
///
/// Membership checks and appends are O(1); the insertion order is kept only
/// so eviction drops the oldest id first. The whole ledger is flushed to a
/// JSON file by the scheduler at the end of each pass — never mid-pass — so
/// a crash between cycles re-announces at most one cycle's worth of items
/// (accepted at-least-once trade-off).
#[derive(Debug)]
pub struct DedupLedger {
    path: PathBuf,
    capacity: usize,
    inner: Mutex<LedgerMap>,
}

type LedgerMap = HashMap<LedgerKey, ChannelSeen>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct LedgerKey {
    tenant: String,
    channel: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChannelSeen {
    uploads: BoundedIdSeq,
    lives: BoundedIdSeq,
}

impl ChannelSeen {
    fn seq_mut(&mut self, kind: ItemKind) -> &mut BoundedIdSeq {
        match kind {
            ItemKind::Upload => &mut self.uploads,
            ItemKind::Live => &mut self.lives,
        }
    }

    fn seq(&self, kind: ItemKind) -> &BoundedIdSeq {
        match kind {
            ItemKind::Upload => &self.uploads,
            ItemKind::Live => &self.lives,
        }
    }
}

/// Append-only id sequence with oldest-first eviction. The set mirrors the
/// deque for O(1) membership; only the deque is persisted.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BoundedIdSeq {
    order: VecDeque<String>,
    #[serde(skip)]
    members: HashSet<String>,
}

impl BoundedIdSeq {
    fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    fn push(&mut self, id: String, capacity: usize) {
        if !self.members.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    fn rebuild_members(&mut self) {
        self.members = self.order.iter().cloned().collect();
    }
}

/// On-disk shape: a list of entries so the key survives JSON's string-only
/// map keys.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    entries: Vec<LedgerFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFileEntry {
    key: LedgerKey,
    seen: ChannelSeen,
}

impl DedupLedger {
    pub fn new<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity: capacity.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Load from disk. Missing or corrupt file yields an empty ledger.
    pub async fn load<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        let ledger = Self::new(path, capacity);
        match fs::read_to_string(&ledger.path).await {
            Ok(s) => match serde_json::from_str::<LedgerFile>(&s) {
                Ok(file) => {
                    let mut map = ledger.inner.lock().expect("ledger mutex poisoned");
                    for mut entry in file.entries {
                        entry.seen.uploads.rebuild_members();
                        entry.seen.lives.rebuild_members();
                        map.insert(entry.key, entry.seen);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = ?e, path = %ledger.path.display(), "ledger file unreadable, starting empty");
                }
            },
            Err(_) => {
                tracing::debug!(path = %ledger.path.display(), "no ledger file yet, starting empty");
            }
        }
        ledger
    }

    /// True iff `item_id` has not been announced for this
    /// (tenant, channel, kind) triple.
    pub fn is_new(&self, tenant: &str, channel: &str, kind: ItemKind, item_id: &str) -> bool {
        let map = self.inner.lock().expect("ledger mutex poisoned");
        let key = LedgerKey {
            tenant: tenant.to_string(),
            channel: channel.to_string(),
        };
        match map.get(&key) {
            Some(seen) => !seen.seq(kind).contains(item_id),
            None => true,
        }
    }

    /// Append `item_id`; past capacity the oldest id is evicted.
    pub fn record(&self, tenant: &str, channel: &str, kind: ItemKind, item_id: &str) {
        let mut map = self.inner.lock().expect("ledger mutex poisoned");
        let key = LedgerKey {
            tenant: tenant.to_string(),
            channel: channel.to_string(),
        };
        map.entry(key)
            .or_default()
            .seq_mut(kind)
            .push(item_id.to_string(), self.capacity);
    }

    /// Write the whole ledger to disk (temp file + rename). Called by the
    /// scheduler at end-of-pass.
    pub async fn flush(&self) -> Result<()> {
        let body = {
            let map = self.inner.lock().expect("ledger mutex poisoned");
            let entries = map
                .iter()
                .map(|(key, seen)| LedgerFileEntry {
                    key: key.clone(),
                    seen: ChannelSeen {
                        uploads: BoundedIdSeq {
                            order: seen.uploads.order.clone(),
                            members: HashSet::new(),
                        },
                        lives: BoundedIdSeq {
                            order: seen.lives.order.clone(),
                            members: HashSet::new(),
                        },
                    },
                })
                .collect();
            serde_json::to_vec_pretty(&LedgerFile { entries }).context("serialize ledger")?
        };

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("create ledger dir {}", dir.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename into {}", self.path.display()))?;
        Ok(())
    }

    /// Ids currently held for a (tenant, channel, kind) triple, oldest first.
    pub fn known_ids(&self, tenant: &str, channel: &str, kind: ItemKind) -> Vec<String> {
        let map = self.inner.lock().expect("ledger mutex poisoned");
        let key = LedgerKey {
            tenant: tenant.to_string(),
            channel: channel.to_string(),
        };
        map.get(&key)
            .map(|seen| seen.seq(kind).order.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of (tenant, channel) pairs tracked. Stats surface only.
    pub fn tracked_pairs(&self) -> usize {
        self.inner.lock().expect("ledger mutex poisoned").len()
    }
}
