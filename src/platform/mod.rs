//! Chat-platform and attachment seams.
//!
//! The engine talks to the platform only through these traits so the
//! Discord client can be swapped for a mock in tests.

mod attachments;
mod discord;


pub use attachments::LocalAttachmentStore;
pub use discord::{DiscordRestClient, DiscordRestClientConfig};

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plans::{RoleId, UserId};

/// Live handle to a guild member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ButtonStyle {
    /// Discord component style code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Success => 3,
            Self::Danger => 4,
        }
    }
}

/// A clickable control whose id comes back as a button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

/// Message posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub content: String,
    pub buttons: Vec<Button>,
    /// Local file to upload with the message.
    pub attachment: Option<PathBuf>,
}

/// Outbound primitives of the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch a guild member. `Ok(None)` means the user is no longer in the guild.
    async fn fetch_member(&self, user_id: &str) -> Result<Option<Member>>;

    async fn add_role(&self, member: &Member, role_id: &str) -> Result<()>;

    async fn remove_role(&self, member: &Member, role_id: &str) -> Result<()>;

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<()>;

    async fn send_channel_message(&self, channel_id: &str, message: &ChannelMessage)
    -> Result<()>;
}

/// Retrieval and storage of uploaded files.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Store `bytes` under `file_name` and return the stored path.
    async fn store_file(&self, file_name: &str, bytes: &[u8]) -> Result<String>;
}
