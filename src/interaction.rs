//! Inbound payloads and command decoding.
//!
//! Button ids are decoded exactly once, here, into a [`Command`]. Nothing
//! past this module looks at raw id strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TollgateError;
use crate::plans::{PayCountry, Plan, UserId};

const CONFIRM_PAID: &str = "confirm_paid";

/// A decoded button id.
///
/// Wire format is `<verb>` or `<verb>_<argument>`: `1m`, `6m`, `1y`,
/// `pay_VN`, `pay_JP`, `confirm_paid`, `approve_<id>`, `reject_<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ChoosePlan(Plan),
    ChooseCountry(PayCountry),
    ConfirmPaid,
    Approve(UserId),
    Reject(UserId),
}

impl Command {
    #[must_use]
    pub fn custom_id(&self) -> String {
        self.to_string()
    }

    /// Operator commands act on another user's record.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        matches!(self, Self::Approve(_) | Self::Reject(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChoosePlan(plan) => f.write_str(plan.code()),
            Self::ChooseCountry(country) => write!(f, "pay_{}", country.code()),
            Self::ConfirmPaid => f.write_str(CONFIRM_PAID),
            Self::Approve(id) => write!(f, "approve_{}", id),
            Self::Reject(id) => write!(f, "reject_{}", id),
        }
    }
}

impl FromStr for Command {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Contains an underscore but is not verb_argument
        if s == CONFIRM_PAID {
            return Ok(Self::ConfirmPaid);
        }
        if let Some(plan) = Plan::from_code(s) {
            return Ok(Self::ChoosePlan(plan));
        }

        let unknown = || TollgateError::bad_request(format!("unknown command '{}'", s));
        let (verb, arg) = s.split_once('_').ok_or_else(unknown)?;
        if arg.is_empty() {
            return Err(unknown());
        }

        match verb {
            "pay" => PayCountry::from_code(arg)
                .map(Self::ChooseCountry)
                .ok_or_else(unknown),
            "approve" => Ok(Self::Approve(arg.to_string())),
            "reject" => Ok(Self::Reject(arg.to_string())),
            _ => Err(unknown()),
        }
    }
}

/// A button click relayed from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonPress {
    /// The user who clicked.
    pub user_id: UserId,
    pub custom_id: String,
}

/// A message relayed from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub author_id: UserId,
    #[serde(default)]
    pub author_is_bot: bool,
    /// Set when the message was posted in a guild channel.
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl DirectMessage {
    /// Only private messages from humans are handled.
    #[must_use]
    pub fn is_relevant(&self) -> bool {
        !self.author_is_bot && self.guild_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
    }

    /// Extension of the uploaded file name, `bin` when there is none usable.
    #[must_use]
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                ext
            }
            _ => "bin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_commands() {
        let cases = [
            ("1m", Command::ChoosePlan(Plan::ShortTerm)),
            ("6m", Command::ChoosePlan(Plan::MidTerm)),
            ("1y", Command::ChoosePlan(Plan::LongTerm)),
            ("pay_VN", Command::ChooseCountry(PayCountry::Vietnam)),
            ("pay_JP", Command::ChooseCountry(PayCountry::Japan)),
            ("confirm_paid", Command::ConfirmPaid),
            ("approve_1234", Command::Approve("1234".to_string())),
            ("reject_1234", Command::Reject("1234".to_string())),
        ];

        for (id, expected) in cases {
            let decoded: Command = id.parse().unwrap();
            assert_eq!(decoded, expected, "{}", id);
            assert_eq!(decoded.custom_id(), id);
        }
    }

    #[test]
    fn test_decode_rejects_unknown() {
        for id in ["", "3m", "pay_US", "pay_", "approve_", "confirm", "delete_1"] {
            let err = id.parse::<Command>().unwrap_err();
            assert!(matches!(err, TollgateError::BadRequest(_)), "{}", id);
        }
    }

    #[test]
    fn test_operator_commands() {
        assert!(Command::Approve("1".into()).is_operator());
        assert!(Command::Reject("1".into()).is_operator());
        assert!(!Command::ConfirmPaid.is_operator());
        assert!(!Command::ChoosePlan(Plan::ShortTerm).is_operator());
    }

    #[test]
    fn test_dm_filtering() {
        let mut dm = DirectMessage {
            author_id: "42".to_string(),
            author_is_bot: false,
            guild_id: None,
            attachments: Vec::new(),
        };
        assert!(dm.is_relevant());

        dm.guild_id = Some("guild".to_string());
        assert!(!dm.is_relevant());

        dm.guild_id = None;
        dm.author_is_bot = true;
        assert!(!dm.is_relevant());
    }

    #[test]
    fn test_attachment_extension_and_type() {
        let mut a = Attachment {
            url: "https://cdn.example/x".to_string(),
            file_name: "bill.final.JPG".to_string(),
            content_type: Some("image/jpeg".to_string()),
        };
        assert_eq!(a.extension(), "JPG");
        assert!(a.is_image());

        a.file_name = "bill".to_string();
        assert_eq!(a.extension(), "bin");

        a.file_name = "evil.png/../x".to_string();
        assert_eq!(a.extension(), "bin");

        a.content_type = None;
        assert!(!a.is_image());
    }

    #[test]
    fn test_payload_json_layout() {
        let dm: DirectMessage = serde_json::from_str(
            r#"{"authorId":"42","attachments":[{"url":"u","fileName":"a.png","contentType":"image/png"}]}"#,
        )
        .unwrap();
        assert!(dm.is_relevant());
        assert_eq!(dm.attachments[0].file_name, "a.png");
    }
}
