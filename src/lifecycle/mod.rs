//! Subscription lifecycle state machine.
//!
//! [`transition`] is pure: given the current record and an event it decides
//! the next record and the side effects to run, without touching storage or
//! the platform. The engine commits the record and then executes the
//! effects in order.
//!
//! | Event               | Guard                         | Next            |
//! |---------------------|-------------------------------|-----------------|
//! | `ChoosePlan`        | any                           | PlanChosen      |
//! | `ChooseCountry`     | plan set                      | AwaitingPayment |
//! | `ConfirmIntentToPay`| payment set                   | unchanged       |
//! | `SubmitBill`        | payment set, image attachment | BillSubmitted   |
//! | `OperatorApprove`   | plan set                      | Active          |
//! | `OperatorReject`    | any                           | removed         |
//! | `ExpirySweepTick`   | past grace                    | removed         |

pub mod messages;

use crate::config::PaymentConfig;
use crate::interaction::Attachment;
use crate::plans::{PayCountry, Plan, PlanCatalog, RoleId, UserId};
use crate::platform::ChannelMessage;
use crate::store::{Payment, Stage, SubscriptionRecord};
use crate::time::add_months;

pub use messages::Reply;

/// Normalized inbound event about one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ChoosePlan(Plan),
    ChooseCountry(PayCountry),
    ConfirmIntentToPay,
    /// A validated bill that has already been stored.
    SubmitBill(StoredBill),
    OperatorApprove,
    OperatorReject,
    ExpirySweepTick,
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChoosePlan(_) => "choose_plan",
            Self::ChooseCountry(_) => "choose_country",
            Self::ConfirmIntentToPay => "confirm_intent_to_pay",
            Self::SubmitBill(_) => "submit_bill",
            Self::OperatorApprove => "operator_approve",
            Self::OperatorReject => "operator_reject",
            Self::ExpirySweepTick => "expiry_sweep_tick",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBill {
    pub path: String,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Make the subscriber hold exactly `role` out of the managed roles.
    Reconcile {
        user_id: UserId,
        role: Option<RoleId>,
    },
    /// Reply to the actor.
    Reply(Reply),
    /// Best-effort DM. The optional replies go to the actor depending on
    /// whether delivery worked.
    DirectMessage {
        user_id: UserId,
        text: String,
        on_success: Option<Reply>,
        on_failure: Option<Reply>,
    },
    NotifyOperators {
        channel_id: String,
        message: ChannelMessage,
    },
}

/// What happens to the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Keep(SubscriptionRecord),
    Remove,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Next,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn keep(record: SubscriptionRecord) -> Self {
        Self {
            next: Next::Keep(record),
            effects: Vec::new(),
        }
    }

    fn remove() -> Self {
        Self {
            next: Next::Remove,
            effects: Vec::new(),
        }
    }

    fn unchanged() -> Self {
        Self {
            next: Next::Unchanged,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Subscriber,
    Operator,
}

/// An event refused by its guard. Nothing is mutated; the message goes back
/// to whoever triggered the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub audience: Audience,
    pub message: String,
}

impl Rejection {
    pub fn subscriber(message: impl Into<String>) -> Self {
        Self {
            audience: Audience::Subscriber,
            message: message.into(),
        }
    }

    pub fn operator(message: impl Into<String>) -> Self {
        Self {
            audience: Audience::Operator,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn into_reply(self) -> Reply {
        Reply::ephemeral(self.message)
    }
}

/// Static inputs to a transition.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// Epoch milliseconds.
    pub now: i64,
    pub grace_ms: i64,
    pub catalog: &'a PlanCatalog,
    pub payments: &'a PaymentConfig,
    pub admin_channel: &'a str,
}

/// Decide the next state and effects of `event` for `subject`.
pub fn transition(
    subject: &str,
    record: Option<&SubscriptionRecord>,
    event: &Event,
    ctx: &Context<'_>,
) -> Result<Transition, Rejection> {
    match event {
        Event::ChoosePlan(plan) => {
            // Keeps expire_at, so an active subscriber stays entitled
            let mut next = record.cloned().unwrap_or_default();
            next.stage = Stage::PlanChosen { plan: *plan };
            Ok(Transition::keep(next).with(Effect::Reply(messages::plan_prompt(*plan))))
        }

        Event::ChooseCountry(country) => {
            let mut next = record.cloned().unwrap_or_default();
            let plan = next
                .stage
                .plan()
                .ok_or_else(|| Rejection::subscriber(messages::NO_PLAN))?;
            let payment = Payment::for_subscriber(subject, *country);
            let reply =
                messages::payment_instructions(plan, &payment, ctx.catalog, ctx.payments);
            next.stage = Stage::AwaitingPayment { plan, payment };
            Ok(Transition::keep(next).with(Effect::Reply(reply)))
        }

        Event::ConfirmIntentToPay => {
            let (_, payment) = pending_payment(record)?;
            Ok(Transition::unchanged().with(Effect::DirectMessage {
                user_id: subject.to_string(),
                text: messages::bill_request(&payment.transfer_note),
                on_success: Some(messages::bill_request_sent()),
                on_failure: Some(messages::dm_failed()),
            }))
        }

        Event::SubmitBill(bill) => {
            let (plan, payment) = pending_payment(record)?;
            let payment = payment.clone();
            let mut next = record.cloned().unwrap_or_default();
            next.stage = Stage::BillSubmitted {
                plan,
                payment: payment.clone(),
                bill_file: bill.path.clone(),
            };

            Ok(Transition::keep(next)
                .with(Effect::Reconcile {
                    user_id: subject.to_string(),
                    role: Some(ctx.catalog.waiting_role(plan).to_string()),
                })
                .with(Effect::NotifyOperators {
                    channel_id: ctx.admin_channel.to_string(),
                    message: messages::operator_notice(subject, plan, &payment, &bill.path),
                })
                .with(Effect::Reply(messages::bill_received())))
        }

        Event::OperatorApprove => {
            let (current, plan) = record
                .and_then(|r| r.stage.plan().map(|plan| (r, plan)))
                .ok_or_else(|| Rejection::operator(messages::invalid_target(subject)))?;

            let base = ctx.now.max(current.expire_at);
            let expire_at = add_months(base, ctx.catalog.months_for(plan));
            let next = SubscriptionRecord {
                expire_at,
                stage: Stage::Active {
                    plan,
                    payment: current.stage.payment().cloned(),
                    bill_file: current.stage.bill_file().map(str::to_string),
                },
            };

            Ok(Transition::keep(next)
                .with(Effect::Reconcile {
                    user_id: subject.to_string(),
                    role: Some(ctx.catalog.final_role(plan).to_string()),
                })
                .with(Effect::DirectMessage {
                    user_id: subject.to_string(),
                    text: messages::approval_dm(plan, expire_at),
                    on_success: None,
                    on_failure: None,
                })
                .with(Effect::Reply(messages::approved_ack(subject, expire_at))))
        }

        Event::OperatorReject => Ok(Transition::remove()
            .with(Effect::Reconcile {
                user_id: subject.to_string(),
                role: None,
            })
            .with(Effect::Reply(messages::rejected_ack(subject)))),

        Event::ExpirySweepTick => match record {
            Some(r) if r.is_past_grace(ctx.now, ctx.grace_ms) => {
                Ok(Transition::remove().with(Effect::Reconcile {
                    user_id: subject.to_string(),
                    role: None,
                }))
            }
            _ => Ok(Transition::unchanged()),
        },
    }
}

/// Check an inbound DM before anything is downloaded.
///
/// Only the first attachment is considered.
pub fn validate_bill<'a>(
    record: Option<&SubscriptionRecord>,
    attachments: &'a [Attachment],
) -> Result<&'a Attachment, Rejection> {
    pending_payment(record)?;
    let first = attachments
        .first()
        .ok_or_else(|| Rejection::subscriber(messages::NO_ATTACHMENT))?;
    if !first.is_image() {
        return Err(Rejection::subscriber(messages::NOT_IMAGE));
    }
    Ok(first)
}

/// Plan and payment a bill would be paying for.
///
/// An active subscriber with a payment on record can renew by sending
/// another bill; the expiry is kept until the operator approves it.
fn pending_payment(record: Option<&SubscriptionRecord>) -> Result<(Plan, &Payment), Rejection> {
    match record.map(|r| &r.stage) {
        Some(Stage::AwaitingPayment { plan, payment })
        | Some(Stage::BillSubmitted { plan, payment, .. })
        | Some(Stage::Active {
            plan,
            payment: Some(payment),
            ..
        }) => Ok((*plan, payment)),
        Some(Stage::PlanChosen { .. }) | Some(Stage::Active { payment: None, .. }) => {
            Err(Rejection::subscriber(messages::NO_COUNTRY))
        }
        Some(Stage::Fresh) | None => Err(Rejection::subscriber(messages::NO_PLAN)),
    }
}
