use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info};

use super::{GatewayError, MuteGateway};
use crate::db::models::MuteKind;

/// Session credentials and endpoint for the platform's v1.1 REST API
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_base: String,
    pub bearer_token: String,
    pub ct0: String,
    pub auth_token: String,
    pub mute_surfaces: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MutedKeywordsResponse {
    #[serde(default)]
    muted_keywords: Vec<MutedKeyword>,
}

#[derive(Debug, Deserialize)]
struct MutedKeyword {
    id: PlatformId,
    keyword: String,
}

/// Ids arrive as strings from the web API but as numbers from some mirrors
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlatformId {
    Text(String),
    Number(u64),
}

impl PlatformId {
    fn into_string(self) -> String {
        match self {
            PlatformId::Text(s) => s,
            PlatformId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MutedUsersResponse {
    #[serde(default)]
    users: Vec<MutedUser>,
    #[serde(default)]
    next_cursor_str: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MutedUser {
    screen_name: String,
}

/// Cookie-session client for the platform's mute endpoints
pub struct HttpMuteGateway {
    client: Client,
    api_base: String,
    mute_surfaces: String,
}

impl HttpMuteGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", settings.bearer_token))?,
        );
        headers.insert(
            COOKIE,
            header_value(&format!(
                "ct0={}; auth_token={}",
                settings.ct0, settings.auth_token
            ))?,
        );
        headers.insert("x-csrf-token", header_value(&settings.ct0)?);
        headers.insert("x-twitter-auth-type", HeaderValue::from_static("OAuth2Session"));
        headers.insert("x-twitter-active-user", HeaderValue::from_static("yes"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            mute_surfaces: settings.mute_surfaces.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<(), GatewayError> {
        let response = self.client.post(self.url(path)).form(form).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn muted_keywords(&self) -> Result<Vec<MutedKeyword>, GatewayError> {
        let response = self
            .client
            .get(self.url("mutes/keywords/list.json"))
            .send()
            .await?;
        let body: MutedKeywordsResponse = check_status(response).await?.json().await?;
        Ok(body.muted_keywords)
    }

    async fn muted_users(&self) -> Result<Vec<String>, GatewayError> {
        let mut names = Vec::new();
        let mut cursor = "-1".to_string();

        loop {
            let response = self
                .client
                .get(self.url("mutes/users/list.json"))
                .query(&[
                    ("cursor", cursor.as_str()),
                    ("include_entities", "false"),
                    ("skip_status", "true"),
                ])
                .send()
                .await?;
            let page: MutedUsersResponse = check_status(response).await?.json().await?;
            names.extend(page.users.into_iter().map(|u| u.screen_name));

            match page.next_cursor_str {
                Some(next) if next != "0" && !next.is_empty() => cursor = next,
                _ => break,
            }
        }

        Ok(names)
    }

    async fn keyword_id(&self, keyword: &str) -> Result<String, GatewayError> {
        let mut matches: Vec<MutedKeyword> = self
            .muted_keywords()
            .await?
            .into_iter()
            .filter(|k| k.keyword == keyword)
            .collect();

        match matches.len() {
            0 => Err(GatewayError::KeywordNotFound(keyword.to_string())),
            1 => Ok(matches.remove(0).id.into_string()),
            _ => Err(GatewayError::AmbiguousKeyword(keyword.to_string())),
        }
    }
}

impl MuteGateway for HttpMuteGateway {
    async fn apply_mute(&self, kind: MuteKind, key: &str) -> Result<(), GatewayError> {
        info!("POST mute {} '{}'", kind, key);
        match kind {
            MuteKind::Keyword => {
                self.post_form(
                    "mutes/keywords/create.json",
                    &[
                        ("keyword", key),
                        ("mute_surfaces", self.mute_surfaces.as_str()),
                        ("mute_option", ""),
                        ("duration", ""),
                    ],
                )
                .await
            }
            MuteKind::Account => {
                self.post_form("mutes/users/create.json", &[("screen_name", key)])
                    .await
            }
        }
    }

    async fn apply_unmute(&self, kind: MuteKind, key: &str) -> Result<(), GatewayError> {
        info!("POST unmute {} '{}'", kind, key);
        match kind {
            MuteKind::Keyword => {
                let id = self.keyword_id(key).await?;
                debug!("Keyword '{}' has platform id {}", key, id);
                self.post_form("mutes/keywords/destroy.json", &[("ids", id.as_str())])
                    .await
            }
            MuteKind::Account => {
                self.post_form("mutes/users/destroy.json", &[("screen_name", key)])
                    .await
            }
        }
    }

    async fn list_active_mutes(&self, kind: MuteKind) -> Result<Vec<String>, GatewayError> {
        match kind {
            MuteKind::Keyword => Ok(self
                .muted_keywords()
                .await?
                .into_iter()
                .map(|k| k.keyword)
                .collect()),
            MuteKind::Account => self.muted_users().await,
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(value)
        .map_err(|_| GatewayError::Other("credential contains characters not allowed in a header".to_string()))
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        body,
    })
}
