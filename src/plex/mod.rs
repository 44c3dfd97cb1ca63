use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::{Account, Credentials, MediaItem, Season};
use crate::plex::model::{
    AccountContainer, Envelope, GeneratorContainer, HomeUsers, Metadata, MetadataContainer,
    Resource, ServerAccount, SharedServers, SignInResponse, SwitchUserResponse,
};

pub mod model;

const PLEX_TV_BASE: &str = "https://plex.tv/";
const PRODUCT: &str = "ondeck-optimizer";
/// Playlist type the server uses for optimized-version generators.
const OPTIMIZE_ITEM_TYPE: &str = "42";
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

/// A signed-in session against one media server.
#[async_trait]
pub trait MediaDirectory: Send + Sync {
    /// Accounts known to the server, excluding the internal system account.
    async fn accounts(&self) -> Result<Vec<Account>>;

    /// On-deck queue of `account`, or of the session owner when `None`.
    async fn on_deck(&self, account: Option<&Account>) -> Result<Vec<MediaItem>>;

    async fn season_episodes(&self, season_key: &str) -> Result<Vec<MediaItem>>;

    async fn show_seasons(&self, show_key: &str) -> Result<Vec<Season>>;

    /// Keys of items that are being optimized or already have an optimized version.
    async fn optimized_keys(&self) -> Result<HashSet<String>>;

    async fn optimize(&self, item: &MediaItem, target_tag_id: u32) -> Result<()>;
}

/// Authenticates and hands back a `MediaDirectory` for the configured server.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MediaDirectory>>;
}

/// Shared HTTP plumbing for plex.tv and server calls.
#[derive(Clone)]
pub struct PlexHttp {
    http: Client,
    plex_tv: Url,
    client_identifier: String,
}

impl fmt::Debug for PlexHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexHttp")
            .field("plex_tv", &self.plex_tv)
            .field("client_identifier", &self.client_identifier)
            .finish_non_exhaustive()
    }
}

impl PlexHttp {
    pub fn new(client_identifier: String, timeout: Duration) -> Result<Self> {
        let plex_tv = Url::parse(PLEX_TV_BASE).context("invalid plex.tv URL")?;
        Self::with_plex_tv(client_identifier, timeout, plex_tv)
    }

    pub fn with_plex_tv(client_identifier: String, timeout: Duration, plex_tv: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ondeck-optimizer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            plex_tv,
            client_identifier,
        })
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        self.request_accepting(method, url, token, "application/json")
    }

    fn request_accepting(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        accept: &'static str,
    ) -> RequestBuilder {
        let rb = self
            .http
            .request(method, url)
            .header("Accept", accept)
            .header("X-Plex-Product", PRODUCT)
            .header("X-Plex-Version", env!("CARGO_PKG_VERSION"))
            .header("X-Plex-Client-Identifier", &self.client_identifier);
        match token {
            Some(token) => rb.header("X-Plex-Token", token),
            None => rb,
        }
    }

    fn plex_tv_url(&self, path: &str) -> Result<Url> {
        self.plex_tv
            .join(path)
            .with_context(|| format!("invalid plex.tv path {path}"))
    }

    async fn send_json<T: DeserializeOwned>(&self, rb: RequestBuilder, what: &str) -> Result<T> {
        self.send_checked(rb, what)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("invalid JSON in {what} response"))
    }

    async fn send_checked(&self, rb: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let res = rb
            .send()
            .await
            .with_context(|| format!("failed to reach Plex for {what}"))?;
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(anyhow!("{what}: unauthorized"));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, what, "Plex API error");
            return Err(anyhow!("{what} failed {status}: {body}"));
        }
        Ok(res)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<String> {
        let url = self.plex_tv_url("users/sign_in.json")?;
        let rb = self
            .request(Method::POST, url, None)
            .basic_auth(&credentials.username, Some(&credentials.password));
        let resp: SignInResponse = self.send_json(rb, "sign in").await?;
        Ok(resp.user.auth_token)
    }

    async fn resources(&self, account_token: &str) -> Result<Vec<Resource>> {
        let mut url = self.plex_tv_url("api/v2/resources")?;
        url.query_pairs_mut()
            .append_pair("includeHttps", "1")
            .append_pair("includeRelay", "1");
        let rb = self.request(Method::GET, url, Some(account_token));
        self.send_json(rb, "resource listing").await
    }
}

/// Signs in through plex.tv and connects to the server named in config.
#[derive(Debug, Clone)]
pub struct PlexConnector {
    http: PlexHttp,
    server_name: String,
}

impl PlexConnector {
    pub fn new(http: PlexHttp, server_name: String) -> Self {
        Self { http, server_name }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_identifier = cfg
            .plex
            .client_identifier
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let http = PlexHttp::new(
            client_identifier,
            Duration::from_secs(cfg.plex.request_timeout_secs),
        )?;
        Ok(Self::new(http, cfg.plex.server_name.clone()))
    }

    async fn reachable_uri(&self, resource: &Resource, token: &str) -> Result<Url> {
        for conn in resource.ordered_connections() {
            let Ok(base) = Url::parse(&conn.uri) else {
                debug!(uri = %conn.uri, "skipping unparsable connection");
                continue;
            };
            let Ok(identity) = base.join("identity") else {
                continue;
            };
            let identity_check = self
                .http
                .request(Method::GET, identity, Some(token))
                .timeout(IDENTITY_TIMEOUT)
                .send()
                .await;
            match identity_check {
                Ok(res) if res.status().is_success() => return Ok(base),
                Ok(res) => debug!(uri = %conn.uri, status = %res.status(), "connection refused"),
                Err(err) => debug!(uri = %conn.uri, ?err, "connection unreachable"),
            }
        }
        Err(anyhow!("no reachable connection for server {}", resource.name))
    }
}

#[async_trait]
impl DirectoryConnector for PlexConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MediaDirectory>> {
        let account_token = self.http.sign_in(credentials).await?;
        let resource = self
            .http
            .resources(&account_token)
            .await?
            .into_iter()
            .find(|r| r.is_server() && r.name == self.server_name)
            .ok_or_else(|| anyhow!("server {:?} not found on this account", self.server_name))?;
        let server_token = resource
            .access_token
            .clone()
            .unwrap_or_else(|| account_token.clone());
        let base_url = self.reachable_uri(&resource, &server_token).await?;
        info!(server = %resource.name, url = %base_url, "connected to media server");
        Ok(Box::new(PlexSession::new(
            self.http.clone(),
            base_url,
            server_token,
            account_token,
            resource.client_identifier,
        )))
    }
}

/// A connected server session. `server_token` authorizes the owner's
/// server calls; `account_token` is used on plex.tv to switch users.
#[derive(Clone)]
pub struct PlexSession {
    http: PlexHttp,
    base_url: Url,
    server_token: String,
    account_token: String,
    machine_id: String,
}

impl fmt::Debug for PlexSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexSession")
            .field("base_url", &self.base_url)
            .field("machine_id", &self.machine_id)
            .finish_non_exhaustive()
    }
}

impl PlexSession {
    pub fn new(
        http: PlexHttp,
        base_url: Url,
        server_token: String,
        account_token: String,
        machine_id: String,
    ) -> Self {
        Self {
            http,
            base_url,
            server_token,
            account_token,
            machine_id,
        }
    }

    fn server_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid server path {path}"))
    }

    async fn metadata(&self, path: &str, token: &str, what: &str) -> Result<Vec<Metadata>> {
        let url = self.server_url(path)?;
        let rb = self.http.request(Method::GET, url, Some(token));
        let env: Envelope<MetadataContainer> = self.http.send_json(rb, what).await?;
        Ok(env.media_container.into_entries())
    }

    async fn children(&self, rating_key: &str) -> Result<Vec<Metadata>> {
        let path = format!("library/metadata/{rating_key}/children");
        self.metadata(&path, &self.server_token, "children listing")
            .await
    }

    /// Server access token for another account. Friends the server is shared
    /// with are looked up by user id in the owner's `shared_servers` grant
    /// list; managed home users are not listed there and go through a switch.
    async fn user_server_token(&self, account: &Account) -> Result<String> {
        match self.shared_server_token(account).await {
            Ok(Some(token)) => return Ok(token),
            Ok(None) => {
                debug!(account = %account.name, "no shared server grant, trying home switch")
            }
            Err(err) => {
                warn!(account = %account.name, ?err, "shared server lookup failed, trying home switch")
            }
        }
        self.home_user_server_token(account).await
    }

    async fn shared_server_token(&self, account: &Account) -> Result<Option<String>> {
        let url = self
            .http
            .plex_tv_url(&format!("api/servers/{}/shared_servers", self.machine_id))?;
        let rb = self.http.request_accepting(
            Method::GET,
            url,
            Some(&self.account_token),
            "application/xml",
        );
        let body = self
            .http
            .send_checked(rb, "shared server listing")
            .await?
            .text()
            .await
            .context("failed to read shared server listing")?;
        let shared = SharedServers::parse(&body).context("invalid shared server listing")?;
        Ok(shared.token_for(account).map(str::to_string))
    }

    /// Switches to a managed home user on plex.tv and reads this server's
    /// resource entry for that user.
    async fn home_user_server_token(&self, account: &Account) -> Result<String> {
        let url = self.http.plex_tv_url("api/v2/home/users")?;
        let rb = self
            .http
            .request(Method::GET, url, Some(&self.account_token));
        let home: HomeUsers = self.http.send_json(rb, "home user listing").await?;
        let user = home
            .users
            .into_iter()
            .find(|u| u.matches(&account.name))
            .ok_or_else(|| anyhow!("account {:?} is not a home user", account.name))?;

        let url = self
            .http
            .plex_tv_url(&format!("api/v2/home/users/{}/switch", user.uuid))?;
        let rb = self
            .http
            .request(Method::POST, url, Some(&self.account_token));
        let switched: SwitchUserResponse = self.http.send_json(rb, "user switch").await?;

        self.http
            .resources(&switched.auth_token)
            .await?
            .into_iter()
            .find(|r| r.client_identifier == self.machine_id)
            .and_then(|r| r.access_token)
            .ok_or_else(|| anyhow!("account {:?} has no access to this server", account.name))
    }

    async fn section_uuid(&self, item: &MediaItem) -> Result<String> {
        if let Some(uuid) = &item.library_section_uuid {
            return Ok(uuid.clone());
        }
        // The section usually sits on the container; `metadata` copies it onto entries.
        let path = format!("library/metadata/{}", item.rating_key);
        self.metadata(&path, &self.server_token, "metadata lookup")
            .await?
            .into_iter()
            .find_map(|m| m.library_section_uuid)
            .ok_or_else(|| anyhow!("no library section for {}", item.key))
    }

    pub fn build_optimize_request(
        &self,
        item: &MediaItem,
        section_uuid: &str,
        target_tag_id: u32,
    ) -> Result<reqwest::Request> {
        let url = self.server_url("playlists/1111/items")?;
        let location = format!("library://{}/item/{}", section_uuid, item.key);
        let tag = target_tag_id.to_string();
        self.http
            .request(Method::PUT, url, Some(&self.server_token))
            .query(&[
                ("Item[type]", OPTIMIZE_ITEM_TYPE),
                ("Item[title]", item.title.as_str()),
                ("Item[target]", ""),
                ("Item[targetTagID]", tag.as_str()),
                ("Item[locationID]", "-1"),
                ("Item[Location][uri]", location.as_str()),
                ("Item[Policy][scope]", "all"),
                ("Item[Policy][value]", ""),
                ("Item[Policy][unwatched]", "0"),
            ])
            .build()
            .context("failed to build optimize request")
    }
}

#[async_trait]
impl MediaDirectory for PlexSession {
    async fn accounts(&self) -> Result<Vec<Account>> {
        let url = self.server_url("accounts")?;
        let rb = self
            .http
            .request(Method::GET, url, Some(&self.server_token));
        let env: Envelope<AccountContainer> =
            self.http.send_json(rb, "account listing").await?;
        Ok(env
            .media_container
            .accounts
            .into_iter()
            .filter_map(ServerAccount::into_account)
            .collect())
    }

    async fn on_deck(&self, account: Option<&Account>) -> Result<Vec<MediaItem>> {
        let token = match account {
            Some(account) => self.user_server_token(account).await?,
            None => self.server_token.clone(),
        };
        let items = self
            .metadata("library/onDeck", &token, "on-deck listing")
            .await?;
        Ok(items.into_iter().map(Metadata::into_item).collect())
    }

    async fn season_episodes(&self, season_key: &str) -> Result<Vec<MediaItem>> {
        let items = self.children(season_key).await?;
        Ok(items
            .into_iter()
            .filter(|m| m.typ == "episode")
            .map(Metadata::into_item)
            .collect())
    }

    async fn show_seasons(&self, show_key: &str) -> Result<Vec<Season>> {
        let items = self.children(show_key).await?;
        Ok(items.into_iter().filter_map(Metadata::into_season).collect())
    }

    async fn optimized_keys(&self) -> Result<HashSet<String>> {
        let mut url = self.server_url("playlists/generators")?;
        url.query_pairs_mut().append_pair("type", OPTIMIZE_ITEM_TYPE);
        let rb = self
            .http
            .request(Method::GET, url, Some(&self.server_token));
        let env: Envelope<GeneratorContainer> =
            self.http.send_json(rb, "optimized listing").await?;

        let mut keys = HashSet::new();
        for generator in env.media_container.items {
            let path = format!("playlists/generators/{}/items", generator.id);
            let items = self
                .metadata(&path, &self.server_token, "optimized items")
                .await?;
            // The first entry is the source item the generator was created for.
            if let Some(first) = items.into_iter().next() {
                keys.insert(first.into_item().key);
            }
        }
        Ok(keys)
    }

    async fn optimize(&self, item: &MediaItem, target_tag_id: u32) -> Result<()> {
        let section_uuid = self.section_uuid(item).await?;
        let request = self.build_optimize_request(item, &section_uuid, target_tag_id)?;
        let res = self
            .http
            .http
            .execute(request)
            .await
            .context("failed to reach Plex for optimize")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("optimize {} failed {}: {}", item.key, status, body));
        }
        info!(key = %item.key, title = %item.title, "optimize submitted");
        Ok(())
    }
}
