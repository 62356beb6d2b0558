//! User-facing copy.

use serde::{Deserialize, Serialize};

use crate::config::PaymentConfig;
use crate::interaction::Command;
use crate::plans::{PayCountry, Plan, PlanCatalog};
use crate::platform::{Button, ButtonStyle, ChannelMessage};
use crate::store::Payment;
use crate::time::format_instant;
use crate::vietqr;

pub const NO_PLAN: &str = "❌ You haven't chosen a plan in the server yet.";
pub const NO_COUNTRY: &str = "❌ Choose where you will pay from first.";
pub const NO_ATTACHMENT: &str = "📸 Please send a **photo of the bill**.";
pub const NOT_IMAGE: &str = "❌ Only image files are accepted.";
pub const BILL_NOT_STORED: &str = "❌ I couldn't save your bill. Please send it again.";
pub const UNKNOWN_COMMAND: &str = "❌ That button is no longer supported.";

/// Reply to the actor who triggered an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    /// Only visible to the actor.
    pub ephemeral: bool,
    /// VietQR payload to render as a QR image next to the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
}

impl Reply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            buttons: Vec::new(),
            ephemeral: true,
            qr_payload: None,
        }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Self {
            ephemeral: false,
            ..Self::ephemeral(content)
        }
    }

    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    #[must_use]
    pub fn with_qr(mut self, payload: String) -> Self {
        self.qr_payload = Some(payload);
        self
    }
}

#[must_use]
pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

/// `2000000` -> `2,000,000`.
#[must_use]
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Shown after a plan button: pick the payment rail.
pub fn plan_prompt(plan: Plan) -> Reply {
    let mut reply = Reply::ephemeral(format!(
        "📦 Plan: {}\nChoose where you will pay from:",
        plan.label()
    ));
    for country in PayCountry::ALL {
        reply = reply.with_button(Button::new(
            Command::ChooseCountry(country).custom_id(),
            format!("{} {}", country.flag(), country.code()),
            ButtonStyle::Primary,
        ));
    }
    reply
}

/// Bank details, amount and transfer note for the chosen rail.
pub fn payment_instructions(
    plan: Plan,
    payment: &Payment,
    catalog: &PlanCatalog,
    payments: &PaymentConfig,
) -> Reply {
    let amount = catalog.price(plan, payment.country);
    let footer = "➡️ After the transfer, press **I have paid** and send a photo of the bill to the bot by DM.";

    let reply = match payment.country {
        PayCountry::Vietnam => {
            let vn = &payments.vn;
            Reply::ephemeral(format!(
                "💳 Payment (VN)\n🏦 {}\n👤 {}\n🔢 {}\n💰 {} VND\n📝 {}\n\n{}",
                vn.bank_name,
                vn.account_name,
                vn.account_number,
                format_amount(amount),
                payment.transfer_note,
                footer
            ))
            .with_qr(vietqr::encode(
                &vn.bank_bin,
                &vn.account_number,
                amount,
                &payment.transfer_note,
            ))
        }
        PayCountry::Japan => {
            let jp = &payments.jp;
            Reply::ephemeral(format!(
                "💳 Payment (JP)\n🏦 {} - {}\n👤 {}\n🔢 {}\n💰 {} JPY\n📝 {}\n\n{}",
                jp.bank_name,
                jp.branch,
                jp.account_name,
                jp.account_number,
                amount,
                payment.transfer_note,
                footer
            ))
        }
    };

    reply.with_button(Button::new(
        Command::ConfirmPaid.custom_id(),
        "I have paid",
        ButtonStyle::Success,
    ))
}

/// DM asking the subscriber for their bill.
#[must_use]
pub fn bill_request(transfer_note: &str) -> String {
    format!(
        "📸 Reply to this message with a photo of your transfer bill.\n📝 Transfer note: {}",
        transfer_note
    )
}

pub fn bill_request_sent() -> Reply {
    Reply::ephemeral("📬 Check your DMs and send the bill there.")
}

pub fn dm_failed() -> Reply {
    Reply::ephemeral(
        "❌ I couldn't send you a DM. Allow direct messages from server members and press the button again.",
    )
}

pub fn bill_received() -> Reply {
    Reply::public("✅ Bill received! Please wait for an operator to approve it.")
}

/// Operator-channel post with the bill and the approve/reject pair.
pub fn operator_notice(user_id: &str, plan: Plan, payment: &Payment, bill_file: &str) -> ChannelMessage {
    ChannelMessage {
        content: format!(
            "🧾 BILL (DM)\n👤 {}\n📦 Plan: {}\n🌏 Pay: {}\n📝 Note: {}",
            mention(user_id),
            plan,
            payment.country,
            payment.transfer_note
        ),
        buttons: vec![
            Button::new(
                Command::Approve(user_id.to_string()).custom_id(),
                "Approve",
                ButtonStyle::Success,
            ),
            Button::new(
                Command::Reject(user_id.to_string()).custom_id(),
                "Reject",
                ButtonStyle::Danger,
            ),
        ],
        attachment: Some(bill_file.into()),
    }
}

#[must_use]
pub fn approval_dm(plan: Plan, expire_at: i64) -> String {
    format!(
        "✅ Your {} plan has been approved! Access runs until {}.",
        plan.label(),
        format_instant(expire_at)
    )
}

pub fn approved_ack(user_id: &str, expire_at: i64) -> Reply {
    Reply::ephemeral(format!(
        "Approved {} until {}",
        mention(user_id),
        format_instant(expire_at)
    ))
}

pub fn rejected_ack(user_id: &str) -> Reply {
    Reply::ephemeral(format!("Rejected {}", mention(user_id)))
}

#[must_use]
pub fn invalid_target(user_id: &str) -> String {
    format!("❌ {} has no plan on record.", mention(user_id))
}
