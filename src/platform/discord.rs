//! Discord REST client.
//!
//! Implements [`Platform`] against the Discord HTTP API (v10) with a bot
//! token. Each call is attempted exactly once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{ChannelMessage, Member, Platform};
use crate::error::{Result, TollgateError};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = concat!("DiscordBot (tollgate, ", env!("CARGO_PKG_VERSION"), ")");

/// Configuration for the Discord client.
#[derive(Debug, Clone)]
pub struct DiscordRestClientConfig {
    pub api_base: String,
    pub guild_id: String,
    pub timeout_seconds: u64,
}

impl DiscordRestClientConfig {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            guild_id: guild_id.into(),
            timeout_seconds: 30,
        }
    }

    #[must_use]
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

pub struct DiscordRestClient {
    http: reqwest::Client,
    token: SecretString,
    config: DiscordRestClientConfig,
}

#[derive(Deserialize)]
struct MemberResponse {
    user: UserResponse,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
}

#[derive(Deserialize)]
struct ChannelResponse {
    id: String,
}

impl DiscordRestClient {
    pub fn new(token: SecretString, config: DiscordRestClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TollgateError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", self.token.expose_secret()),
            )
    }

    /// Map a non-success status to an error. 401 is fatal.
    async fn check(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(TollgateError::unauthorized(
                "Discord rejected the bot token",
            ));
        }

        let body = response.text().await.unwrap_or_default();
        Err(TollgateError::Platform {
            operation: operation.to_string(),
            message: format!("HTTP {}: {}", status.as_u16(), body),
            status: Some(status.as_u16()),
        })
    }

    async fn open_dm_channel(&self, user_id: &str) -> Result<String> {
        let response = self
            .request(Method::POST, "/users/@me/channels")
            .json(&json!({ "recipient_id": user_id }))
            .send()
            .await?;
        let channel: ChannelResponse = Self::check("open_dm", response).await?.json().await?;
        Ok(channel.id)
    }

    fn message_payload(message: &ChannelMessage) -> serde_json::Value {
        let mut payload = json!({ "content": message.content });
        if !message.buttons.is_empty() {
            let buttons: Vec<serde_json::Value> = message
                .buttons
                .iter()
                .map(|b| {
                    json!({
                        "type": 2,
                        "style": b.style.code(),
                        "label": b.label,
                        "custom_id": b.custom_id,
                    })
                })
                .collect();
            payload["components"] = json!([{ "type": 1, "components": buttons }]);
        }
        payload
    }
}

#[async_trait]
impl Platform for DiscordRestClient {
    async fn fetch_member(&self, user_id: &str) -> Result<Option<Member>> {
        let path = format!("/guilds/{}/members/{}", self.config.guild_id, user_id);
        let response = self.request(Method::GET, &path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let member: MemberResponse = Self::check("fetch_member", response).await?.json().await?;
        Ok(Some(Member {
            user_id: member.user.id,
            roles: member.roles,
        }))
    }

    async fn add_role(&self, member: &Member, role_id: &str) -> Result<()> {
        let path = format!(
            "/guilds/{}/members/{}/roles/{}",
            self.config.guild_id, member.user_id, role_id
        );
        let response = self.request(Method::PUT, &path).send().await?;
        Self::check("add_role", response).await?;
        Ok(())
    }

    async fn remove_role(&self, member: &Member, role_id: &str) -> Result<()> {
        let path = format!(
            "/guilds/{}/members/{}/roles/{}",
            self.config.guild_id, member.user_id, role_id
        );
        let response = self.request(Method::DELETE, &path).send().await?;
        Self::check("remove_role", response).await?;
        Ok(())
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<()> {
        let channel_id = self.open_dm_channel(user_id).await?;
        let path = format!("/channels/{}/messages", channel_id);
        let response = self
            .request(Method::POST, &path)
            .json(&json!({ "content": text }))
            .send()
            .await?;
        Self::check("send_dm", response).await?;
        Ok(())
    }

    async fn send_channel_message(
        &self,
        channel_id: &str,
        message: &ChannelMessage,
    ) -> Result<()> {
        let path = format!("/channels/{}/messages", channel_id);
        let payload = Self::message_payload(message);

        let request = match &message.attachment {
            Some(file) => {
                let bytes = tokio::fs::read(file).await?;
                let file_name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "bill".to_string());
                let form = reqwest::multipart::Form::new()
                    .text("payload_json", payload.to_string())
                    .part(
                        "files[0]",
                        reqwest::multipart::Part::bytes(bytes).file_name(file_name),
                    );
                self.request(Method::POST, &path).multipart(form)
            }
            None => self.request(Method::POST, &path).json(&payload),
        };

        let response = request.send().await?;
        Self::check("send_channel_message", response).await?;
        Ok(())
    }
}
