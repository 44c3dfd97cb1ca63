#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ondeck_optimizer::db;
use ondeck_optimizer::model::{Account, Credentials, EpisodeRef, MediaItem, MediaKind, Season};
use ondeck_optimizer::plex::{DirectoryConnector, MediaDirectory};
use ondeck_optimizer::state::AppContext;

pub async fn setup_pool() -> db::Pool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn movie(key: &str) -> MediaItem {
    MediaItem {
        key: key.to_string(),
        rating_key: key.to_string(),
        title: format!("movie {key}"),
        kind: MediaKind::Movie,
        library_section_uuid: Some("section".into()),
    }
}

pub fn episode(key: &str, season_key: &str, show_key: &str, index: i64) -> MediaItem {
    MediaItem {
        key: key.to_string(),
        rating_key: key.to_string(),
        title: format!("episode {key}"),
        kind: MediaKind::Episode(EpisodeRef {
            season_key: season_key.to_string(),
            show_key: show_key.to_string(),
            index: Some(index),
        }),
        library_section_uuid: Some("section".into()),
    }
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    accounts_fail: bool,
    queues: HashMap<Option<String>, Option<Vec<MediaItem>>>,
    seasons: HashMap<String, Vec<MediaItem>>,
    shows: HashMap<String, Vec<Season>>,
    optimized: HashSet<String>,
    optimized_fail: bool,
    failing_submits: HashSet<String>,
    submitted: Vec<String>,
}

/// In-memory media server. Clones share state so a test can inspect calls
/// after handing a copy to the code under test.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_queue(self, items: Vec<MediaItem>) -> Self {
        self.state.lock().unwrap().queues.insert(None, Some(items));
        self
    }

    pub fn account_queue(self, id: i64, name: &str, items: Vec<MediaItem>) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            st.accounts.push(Account {
                id,
                name: name.to_string(),
            });
            st.queues.insert(Some(name.to_string()), Some(items));
        }
        self
    }

    /// An account whose queue cannot be fetched.
    pub fn broken_account(self, id: i64, name: &str) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            st.accounts.push(Account {
                id,
                name: name.to_string(),
            });
            st.queues.insert(Some(name.to_string()), None);
        }
        self
    }

    pub fn accounts_fail(self) -> Self {
        self.state.lock().unwrap().accounts_fail = true;
        self
    }

    /// Register a show as `(season_key, season_index, episode_keys)` entries.
    /// Episodes are numbered from 1 in the given order.
    pub fn show(self, show_key: &str, seasons: &[(&str, i64, &[&str])]) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            let mut listed = Vec::new();
            for (season_key, season_index, episodes) in seasons {
                listed.push(Season {
                    rating_key: season_key.to_string(),
                    title: format!("Season {season_index}"),
                    index: Some(*season_index),
                });
                let eps = episodes
                    .iter()
                    .enumerate()
                    .map(|(i, key)| episode(key, season_key, show_key, i as i64 + 1))
                    .collect();
                st.seasons.insert(season_key.to_string(), eps);
            }
            st.shows.insert(show_key.to_string(), listed);
        }
        self
    }

    pub fn already_optimized(self, keys: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .optimized
            .extend(keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn optimized_listing_fails(self) -> Self {
        self.state.lock().unwrap().optimized_fail = true;
        self
    }

    pub fn failing_submit(self, key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_submits
            .insert(key.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl MediaDirectory for FakeDirectory {
    async fn accounts(&self) -> Result<Vec<Account>> {
        let st = self.state.lock().unwrap();
        if st.accounts_fail {
            return Err(anyhow!("accounts unavailable"));
        }
        Ok(st.accounts.clone())
    }

    async fn on_deck(&self, account: Option<&Account>) -> Result<Vec<MediaItem>> {
        let st = self.state.lock().unwrap();
        let name = account.map(|a| a.name.clone());
        match st.queues.get(&name) {
            Some(Some(items)) => Ok(items.clone()),
            Some(None) => Err(anyhow!("cannot switch to {:?}", name)),
            None => Ok(Vec::new()),
        }
    }

    async fn season_episodes(&self, season_key: &str) -> Result<Vec<MediaItem>> {
        let st = self.state.lock().unwrap();
        st.seasons
            .get(season_key)
            .cloned()
            .ok_or_else(|| anyhow!("unknown season {season_key}"))
    }

    async fn show_seasons(&self, show_key: &str) -> Result<Vec<Season>> {
        let st = self.state.lock().unwrap();
        st.shows
            .get(show_key)
            .cloned()
            .ok_or_else(|| anyhow!("unknown show {show_key}"))
    }

    async fn optimized_keys(&self) -> Result<HashSet<String>> {
        let st = self.state.lock().unwrap();
        if st.optimized_fail {
            return Err(anyhow!("optimized listing unavailable"));
        }
        Ok(st.optimized.clone())
    }

    async fn optimize(&self, item: &MediaItem, _target_tag_id: u32) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.submitted.push(item.key.clone());
        if st.failing_submits.contains(&item.key) {
            return Err(anyhow!("transcoder rejected {}", item.key));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeConnector {
    directory: FakeDirectory,
    fail: bool,
    connects: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(directory: FakeDirectory) -> Self {
        Self {
            directory,
            fail: false,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeDirectory::new())
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryConnector for FakeConnector {
    async fn connect(&self, _credentials: &Credentials) -> Result<Box<dyn MediaDirectory>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("invalid username or password"));
        }
        Ok(Box::new(self.directory.clone()))
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "owner".into(),
        password: "secret".into(),
    }
}

pub fn context(pool: db::Pool, connector: &FakeConnector, secrets_path: PathBuf) -> AppContext {
    AppContext::new(pool, Arc::new(connector.clone()), secrets_path, 3)
}

pub fn write_secrets(dir: &std::path::Path, body: &str) -> PathBuf {
    let path = dir.join("secrets.json");
    std::fs::write(&path, body).unwrap();
    path
}
