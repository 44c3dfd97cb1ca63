//! On-deck resolution: gather every account's queue, add each episode's
//! successor, and collapse the result by item key.
use anyhow::{anyhow, Result};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::model::{Account, MediaItem};
use crate::plex::MediaDirectory;

/// On-deck items observed for one account.
#[derive(Debug, Clone)]
pub struct AccountQueueSnapshot {
    pub account: String,
    pub items: Vec<MediaItem>,
}

/// Items eligible for optimization in one cycle, keyed by item key.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    items: BTreeMap<String, MediaItem>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an item with the same key was already present.
    pub fn insert(&mut self, item: MediaItem) -> bool {
        match self.items.entry(item.key.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(item);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.values()
    }
}

/// Resolve the candidate set across the owner and every server account.
#[instrument(skip_all)]
pub async fn resolve(directory: &dyn MediaDirectory) -> CandidateSet {
    let snapshots = snapshots(directory).await;
    let candidates = expand(directory, &snapshots).await;
    info!(
        accounts = snapshots.len(),
        candidates = candidates.len(),
        "resolved on-deck candidates"
    );
    candidates
}

/// Fetch the owner's queue and each account's queue. Accounts whose queue
/// cannot be fetched are left out.
pub async fn snapshots(directory: &dyn MediaDirectory) -> Vec<AccountQueueSnapshot> {
    let accounts = match directory.accounts().await {
        Ok(accounts) => accounts,
        Err(err) => {
            warn!(?err, "failed to list accounts; using the owner's queue only");
            Vec::new()
        }
    };

    let mut out = Vec::with_capacity(accounts.len() + 1);
    if let Some(snapshot) = fetch_queue(directory, None).await {
        out.push(snapshot);
    }
    for account in &accounts {
        if let Some(snapshot) = fetch_queue(directory, Some(account)).await {
            out.push(snapshot);
        }
    }
    out
}

async fn fetch_queue(
    directory: &dyn MediaDirectory,
    account: Option<&Account>,
) -> Option<AccountQueueSnapshot> {
    let label = account.map_or_else(|| "<owner>".to_string(), |a| a.name.clone());
    match directory.on_deck(account).await {
        Ok(items) => {
            debug!(account = %label, items = items.len(), "fetched on-deck queue");
            Some(AccountQueueSnapshot {
                account: label,
                items,
            })
        }
        Err(err) => {
            warn!(account = %label, ?err, "skipping account; on-deck unavailable");
            None
        }
    }
}

/// Turn snapshots into a candidate set, adding each episode's successor.
pub async fn expand(
    directory: &dyn MediaDirectory,
    snapshots: &[AccountQueueSnapshot],
) -> CandidateSet {
    let mut set = CandidateSet::new();
    // Queued episodes already looked ahead from, so shared items navigate once.
    let mut expanded: HashSet<&str> = HashSet::new();
    for snapshot in snapshots {
        for item in &snapshot.items {
            set.insert(item.clone());
            if item.episode().is_none() || !expanded.insert(item.key.as_str()) {
                continue;
            }
            match successor(directory, item).await {
                Ok(Some(next)) => {
                    set.insert(next);
                }
                Ok(None) => {}
                Err(err) => warn!(key = %item.key, ?err, "could not look ahead from episode"),
            }
        }
    }
    set
}

/// The episode a viewer would watch after `episode`: the next one in its
/// season, else the first of the following season, else none.
pub async fn successor(
    directory: &dyn MediaDirectory,
    episode: &MediaItem,
) -> Result<Option<MediaItem>> {
    let ep = episode
        .episode()
        .ok_or_else(|| anyhow!("{} is not an episode", episode.key))?;

    let mut season_eps = directory.season_episodes(&ep.season_key).await?;
    season_eps.sort_by_key(|e| ordinal(e.episode().and_then(|x| x.index)));
    let pos = season_eps
        .iter()
        .position(|e| e.key == episode.key)
        .ok_or_else(|| anyhow!("{} not found in season {}", episode.key, ep.season_key))?;
    if pos + 1 < season_eps.len() {
        return Ok(Some(season_eps.swap_remove(pos + 1)));
    }

    let mut show_seasons = directory.show_seasons(&ep.show_key).await?;
    show_seasons.sort_by_key(|s| ordinal(s.index));
    let pos = show_seasons
        .iter()
        .position(|s| s.rating_key == ep.season_key)
        .ok_or_else(|| anyhow!("season {} not found in show {}", ep.season_key, ep.show_key))?;
    let Some(next_season) = show_seasons.get(pos + 1) else {
        return Ok(None);
    };

    let mut next_eps = directory.season_episodes(&next_season.rating_key).await?;
    next_eps.sort_by_key(|e| ordinal(e.episode().and_then(|x| x.index)));
    Ok(next_eps.into_iter().next())
}

/// Sort key that keeps unnumbered entries after numbered ones.
fn ordinal(index: Option<i64>) -> (bool, i64) {
    match index {
        Some(i) => (false, i),
        None => (true, 0),
    }
}
