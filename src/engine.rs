//! The event lane.
//!
//! Every event, interactive or synthetic, runs as "read record, decide,
//! mutate, persist, effects" while holding the member store lock. Effects of
//! one event therefore finish before the next event reads its record.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::PaymentConfig;
use crate::entitlements::RoleSync;
use crate::error::{Result, TollgateError};
use crate::interaction::{ButtonPress, Command, DirectMessage};
use crate::lifecycle::{self, messages, Context, Effect, Event, Next, Reply, StoredBill};
use crate::plans::{PlanCatalog, UserId};
use crate::platform::{AttachmentStore, Platform};
use crate::store::{MemberStore, SubscriptionRecord};
use crate::time::now_millis;

/// Settings the engine needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub admin_channel: String,
    pub grace_ms: i64,
    pub payments: PaymentConfig,
}

/// Replies produced while handling one event, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub replies: Vec<Reply>,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records past their grace period when the sweep started.
    pub candidates: usize,
    pub removed: usize,
}

pub struct Engine {
    store: Mutex<MemberStore>,
    platform: Arc<dyn Platform>,
    attachments: Arc<dyn AttachmentStore>,
    roles: RoleSync,
    catalog: PlanCatalog,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        store: MemberStore,
        platform: Arc<dyn Platform>,
        attachments: Arc<dyn AttachmentStore>,
        catalog: PlanCatalog,
        settings: EngineSettings,
    ) -> Self {
        let roles = RoleSync::new(platform.clone(), &catalog);
        Self {
            store: Mutex::new(store),
            platform,
            attachments,
            roles,
            catalog,
            settings,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Copy of one record.
    pub async fn record(&self, user_id: &str) -> Option<SubscriptionRecord> {
        self.store.lock().await.get(user_id).cloned()
    }

    /// Copy of every record, sorted by id.
    pub async fn members(&self) -> Vec<(UserId, SubscriptionRecord)> {
        let store = self.store.lock().await;
        let mut members: Vec<(UserId, SubscriptionRecord)> = store
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    /// Handle a button press.
    pub async fn press(&self, press: &ButtonPress) -> Result<Outcome> {
        self.press_at(press, now_millis()).await
    }

    pub async fn press_at(&self, press: &ButtonPress, now: i64) -> Result<Outcome> {
        let command: Command = match press.custom_id.parse() {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(user_id = %press.user_id, error = %e, "Ignoring unknown button");
                return Ok(Outcome::reply(Reply::ephemeral(messages::UNKNOWN_COMMAND)));
            }
        };

        if command.is_operator() {
            tracing::info!(operator_id = %press.user_id, command = %command, "Operator decision");
        }

        let actor = press.user_id.clone();
        let (subject, event) = match command {
            Command::ChoosePlan(plan) => (actor, Event::ChoosePlan(plan)),
            Command::ChooseCountry(country) => (actor, Event::ChooseCountry(country)),
            Command::ConfirmPaid => (actor, Event::ConfirmIntentToPay),
            Command::Approve(target) => (target, Event::OperatorApprove),
            Command::Reject(target) => (target, Event::OperatorReject),
        };

        self.handle_at(&subject, event, now).await
    }

    /// Handle a relayed message. Only private messages from humans count;
    /// the first attachment is taken as the bill.
    pub async fn direct_message(&self, message: &DirectMessage) -> Result<Outcome> {
        self.direct_message_at(message, now_millis()).await
    }

    pub async fn direct_message_at(&self, message: &DirectMessage, now: i64) -> Result<Outcome> {
        if !message.is_relevant() {
            tracing::debug!(author_id = %message.author_id, "Ignoring bot or guild message");
            return Ok(Outcome::default());
        }

        let subject = message.author_id.as_str();
        let mut store = self.store.lock().await;

        let attachment = match lifecycle::validate_bill(store.get(subject), &message.attachments) {
            Ok(attachment) => attachment,
            Err(rejection) => {
                tracing::info!(user_id = %subject, reason = %rejection.message, "Bill refused");
                return Ok(Outcome::reply(Reply::public(rejection.message)));
            }
        };

        let file_name = format!("{}_{}.{}", subject, now, attachment.extension());
        let stored = match self.attachments.fetch_bytes(&attachment.url).await {
            Ok(bytes) => self.attachments.store_file(&file_name, &bytes).await,
            Err(e) => Err(e),
        };
        let path = match stored {
            Ok(path) => path,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(user_id = %subject, error = %e, "Could not store bill");
                return Ok(Outcome::reply(Reply::public(messages::BILL_NOT_STORED)));
            }
        };

        self.apply(&mut store, subject, Event::SubmitBill(StoredBill { path }), now)
            .await
    }

    /// Run one event for `subject` at the current time.
    pub async fn handle(&self, subject: &str, event: Event) -> Result<Outcome> {
        self.handle_at(subject, event, now_millis()).await
    }

    pub async fn handle_at(&self, subject: &str, event: Event, now: i64) -> Result<Outcome> {
        let mut store = self.store.lock().await;
        self.apply(&mut store, subject, event, now).await
    }

    /// Expire every record past its grace period at the current time.
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(now_millis()).await
    }

    /// Each candidate is handled as its own event, so interactive events
    /// can interleave between records.
    pub async fn sweep_at(&self, now: i64) -> Result<SweepReport> {
        let candidates = self
            .store
            .lock()
            .await
            .expired_ids(now, self.settings.grace_ms);

        let mut report = SweepReport {
            candidates: candidates.len(),
            removed: 0,
        };

        for user_id in &candidates {
            let mut store = self.store.lock().await;
            self.apply(&mut store, user_id, Event::ExpirySweepTick, now)
                .await?;
            if store.get(user_id).is_none() {
                report.removed += 1;
            }
        }

        tracing::info!(
            candidates = report.candidates,
            removed = report.removed,
            "Expiry sweep finished"
        );
        Ok(report)
    }

    fn context(&self, now: i64) -> Context<'_> {
        Context {
            now,
            grace_ms: self.settings.grace_ms,
            catalog: &self.catalog,
            payments: &self.settings.payments,
            admin_channel: &self.settings.admin_channel,
        }
    }

    async fn apply(
        &self,
        store: &mut MemberStore,
        subject: &str,
        event: Event,
        now: i64,
    ) -> Result<Outcome> {
        let ctx = self.context(now);
        let transition = match lifecycle::transition(subject, store.get(subject), &event, &ctx) {
            Ok(transition) => transition,
            Err(rejection) => {
                tracing::info!(
                    user_id = %subject,
                    event = event.name(),
                    audience = ?rejection.audience,
                    reason = %rejection.message,
                    "Event rejected"
                );
                return Ok(Outcome::reply(rejection.into_reply()));
            }
        };

        match transition.next {
            Next::Keep(record) => {
                let stage = record.stage.name();
                store.upsert(subject, |r| *r = record)?;
                tracing::info!(user_id = %subject, event = event.name(), stage, "Record updated");
            }
            Next::Remove => {
                if store.remove(subject)?.is_some() {
                    tracing::info!(user_id = %subject, event = event.name(), "Record removed");
                }
            }
            Next::Unchanged => {}
        }

        let mut outcome = Outcome::default();
        for effect in transition.effects {
            self.execute(effect, &mut outcome).await?;
        }
        Ok(outcome)
    }

    async fn execute(&self, effect: Effect, outcome: &mut Outcome) -> Result<()> {
        match effect {
            Effect::Reconcile { user_id, role } => {
                self.roles.reconcile(&user_id, role.as_deref()).await?;
            }
            Effect::Reply(reply) => outcome.replies.push(reply),
            Effect::DirectMessage {
                user_id,
                text,
                on_success,
                on_failure,
            } => match self.platform.send_dm(&user_id, &text).await {
                Ok(()) => outcome.replies.extend(on_success),
                Err(e) => {
                    ignore_transient("send_dm", &user_id, e)?;
                    outcome.replies.extend(on_failure);
                }
            },
            Effect::NotifyOperators {
                channel_id,
                message,
            } => {
                if let Err(e) = self.platform.send_channel_message(&channel_id, &message).await {
                    ignore_transient("send_channel_message", &channel_id, e)?;
                }
            }
        }
        Ok(())
    }
}

/// Platform errors are logged and dropped unless fatal.
fn ignore_transient(operation: &str, target: &str, error: TollgateError) -> Result<()> {
    if error.is_fatal() {
        return Err(error);
    }
    tracing::warn!(operation, resource = %target, error = %error, "Platform call failed");
    Ok(())
}

/// Engine wired to in-memory doubles.
#[cfg(any(test, feature = "test-platform"))]
pub mod test {
    use super::*;
    use crate::platform::test::{MockAttachments, MockPlatform};
    use crate::store::test::InMemorySnapshot;
    use crate::time::DAY_MS;

    pub const ADMIN_CHANNEL: &str = "admin-channel";

    pub struct Harness {
        pub engine: Arc<Engine>,
        pub platform: MockPlatform,
        pub attachments: MockAttachments,
        pub snapshot: InMemorySnapshot,
    }

    impl Harness {
        #[must_use]
        pub fn new() -> Self {
            Self::with_snapshot(InMemorySnapshot::new())
        }

        /// Start from an existing snapshot, as after a restart.
        #[must_use]
        pub fn with_snapshot(snapshot: InMemorySnapshot) -> Self {
            let platform = MockPlatform::new();
            let attachments = MockAttachments::new();
            let store = MemberStore::load(snapshot.clone()).expect("in-memory load");
            let engine = Engine::new(
                store,
                Arc::new(platform.clone()),
                Arc::new(attachments.clone()),
                crate::plans::test::catalog(),
                EngineSettings {
                    admin_channel: ADMIN_CHANNEL.to_string(),
                    grace_ms: 2 * DAY_MS,
                    payments: PaymentConfig::default(),
                },
            );
            Self {
                engine: Arc::new(engine),
                platform,
                attachments,
                snapshot,
            }
        }

        /// Click `custom_id` as `user_id`.
        pub async fn press(&self, user_id: &str, custom_id: &str, now: i64) -> Outcome {
            let press = ButtonPress {
                user_id: user_id.to_string(),
                custom_id: custom_id.to_string(),
            };
            self.engine.press_at(&press, now).await.expect("press")
        }

        /// DM an image bill as `user_id`.
        pub async fn send_bill(&self, user_id: &str, now: i64) -> Outcome {
            let url = format!("https://cdn.example/{}/bill.png", user_id);
            self.attachments.serve(&url, b"png");
            let message = DirectMessage {
                author_id: user_id.to_string(),
                author_is_bot: false,
                guild_id: None,
                attachments: vec![crate::interaction::Attachment {
                    url,
                    file_name: "bill.png".to_string(),
                    content_type: Some("image/png".to_string()),
                }],
            };
            self.engine
                .direct_message_at(&message, now)
                .await
                .expect("direct message")
        }
    }

    impl Default for Harness {
        fn default() -> Self {
            Self::new()
        }
    }
}
