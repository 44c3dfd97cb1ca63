use serde::Deserialize;

use crate::model::{Account, EpisodeRef, MediaItem, MediaKind, Season};

/// Every server payload is wrapped in a `MediaContainer` object.
#[derive(Deserialize, Debug)]
pub struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: T,
}

#[derive(Deserialize, Debug, Default)]
pub struct MetadataContainer {
    #[serde(rename = "librarySectionUUID")]
    pub library_section_uuid: Option<String>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<Metadata>,
}

impl MetadataContainer {
    /// Entries with the container's library section filled in where the
    /// entry itself does not carry one.
    pub fn into_entries(self) -> Vec<Metadata> {
        let section = self.library_section_uuid;
        self.metadata
            .into_iter()
            .map(|mut m| {
                if m.library_section_uuid.is_none() {
                    m.library_section_uuid = section.clone();
                }
                m
            })
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub rating_key: String,
    pub key: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub title: String,
    pub index: Option<i64>,
    pub parent_rating_key: Option<String>,
    pub grandparent_rating_key: Option<String>,
    #[serde(rename = "librarySectionUUID")]
    pub library_section_uuid: Option<String>,
}

impl Metadata {
    pub fn into_item(self) -> MediaItem {
        // Containers report `/children` on their key; the item itself is the parent path.
        let key = self
            .key
            .strip_suffix("/children")
            .map(str::to_string)
            .unwrap_or(self.key);
        let kind = match (
            self.typ.as_str(),
            self.parent_rating_key,
            self.grandparent_rating_key,
        ) {
            ("episode", Some(season_key), Some(show_key)) => MediaKind::Episode(EpisodeRef {
                season_key,
                show_key,
                index: self.index,
            }),
            ("movie", _, _) => MediaKind::Movie,
            (other, _, _) => MediaKind::Other(other.to_string()),
        };
        MediaItem {
            key,
            rating_key: self.rating_key,
            title: self.title,
            kind,
            library_section_uuid: self.library_section_uuid,
        }
    }

    pub fn into_season(self) -> Option<Season> {
        if self.typ != "season" {
            return None;
        }
        Some(Season {
            rating_key: self.rating_key,
            title: self.title,
            index: self.index,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AccountContainer {
    #[serde(rename = "Account", default)]
    pub accounts: Vec<ServerAccount>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerAccount {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

impl ServerAccount {
    /// Id 0 is the server's internal system account and has no queue.
    pub fn into_account(self) -> Option<Account> {
        if self.id == 0 || self.name.trim().is_empty() {
            return None;
        }
        Some(Account {
            id: self.id,
            name: self.name,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct GeneratorContainer {
    #[serde(rename = "Item", default)]
    pub items: Vec<Generator>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Generator {
    pub id: i64,
}

#[derive(Deserialize, Debug)]
pub struct SignInResponse {
    pub user: SignInUser,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignInUser {
    pub auth_token: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub client_identifier: String,
    #[serde(default)]
    pub provides: String,
    pub access_token: Option<String>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Resource {
    pub fn is_server(&self) -> bool {
        self.provides.split(',').any(|p| p.trim() == "server")
    }

    /// Direct connections first, local before remote, relays last.
    pub fn ordered_connections(&self) -> Vec<&Connection> {
        let mut conns: Vec<&Connection> = self.connections.iter().collect();
        conns.sort_by_key(|c| (c.relay, !c.local));
        conns
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Connection {
    pub uri: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub relay: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct HomeUsers {
    #[serde(default)]
    pub users: Vec<HomeUser>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HomeUser {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl HomeUser {
    pub fn matches(&self, name: &str) -> bool {
        self.title == name || self.username.as_deref() == Some(name)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SwitchUserResponse {
    pub auth_token: String,
}

/// plex.tv `shared_servers` listing. The endpoint only speaks XML, so fields
/// are element attributes.
#[derive(Deserialize, Debug, Default)]
pub struct SharedServers {
    #[serde(rename = "SharedServer", default)]
    pub servers: Vec<SharedServer>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SharedServer {
    #[serde(rename = "@userID")]
    pub user_id: i64,
    #[serde(rename = "@username", default)]
    pub username: String,
    #[serde(rename = "@accessToken")]
    pub access_token: String,
}

impl SharedServers {
    pub fn parse(body: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(body)
    }

    /// Token granted to `account`, matched on its plex.tv user id.
    pub fn token_for(&self, account: &Account) -> Option<&str> {
        self.servers
            .iter()
            .find(|s| s.user_id == account.id)
            .map(|s| s.access_token.as_str())
    }
}
