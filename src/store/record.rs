use serde::{Deserialize, Serialize};

use crate::plans::{PayCountry, Plan};

/// Payment rail chosen by a subscriber, with the note that ties a bank
/// transfer back to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub country: PayCountry,
    pub transfer_note: String,
}

impl Payment {
    /// The transfer note is derived from the subscriber id so a transfer
    /// can always be matched without extra state.
    #[must_use]
    pub fn for_subscriber(subscriber: &str, country: PayCountry) -> Self {
        Self {
            country,
            transfer_note: transfer_note(subscriber),
        }
    }
}

#[must_use]
pub fn transfer_note(subscriber: &str) -> String {
    format!("DISCORD_{}", subscriber)
}

/// Where a subscriber is in the purchase flow.
///
/// Entitlement is a separate axis: a subscriber is entitled while
/// `expire_at` lies in the future, whatever the stage. Re-choosing a plan
/// while entitled moves the stage back to [`Stage::PlanChosen`] and keeps the
/// expiry untouched until the next approval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Stage {
    /// Interacted, no plan yet.
    #[default]
    Fresh,
    PlanChosen {
        plan: Plan,
    },
    /// Country chosen and transfer note issued; waiting for the bill.
    AwaitingPayment {
        plan: Plan,
        payment: Payment,
    },
    /// Bill stored and waiting role granted; waiting for an operator.
    BillSubmitted {
        plan: Plan,
        payment: Payment,
        bill_file: String,
    },
    /// Approved by an operator; final role granted.
    Active {
        plan: Plan,
        payment: Option<Payment>,
        bill_file: Option<String>,
    },
}

impl Stage {
    #[must_use]
    pub fn plan(&self) -> Option<Plan> {
        match self {
            Self::Fresh => None,
            Self::PlanChosen { plan }
            | Self::AwaitingPayment { plan, .. }
            | Self::BillSubmitted { plan, .. }
            | Self::Active { plan, .. } => Some(*plan),
        }
    }

    #[must_use]
    pub fn payment(&self) -> Option<&Payment> {
        match self {
            Self::AwaitingPayment { payment, .. } | Self::BillSubmitted { payment, .. } => {
                Some(payment)
            }
            Self::Active { payment, .. } => payment.as_ref(),
            Self::Fresh | Self::PlanChosen { .. } => None,
        }
    }

    #[must_use]
    pub fn bill_file(&self) -> Option<&str> {
        match self {
            Self::BillSubmitted { bill_file, .. } => Some(bill_file),
            Self::Active { bill_file, .. } => bill_file.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::PlanChosen { .. } => "plan_chosen",
            Self::AwaitingPayment { .. } => "awaiting_payment",
            Self::BillSubmitted { .. } => "bill_submitted",
            Self::Active { .. } => "active",
        }
    }
}

/// One subscriber's subscription state.
///
/// Stored in the snapshot with the field names of the earlier JSON file
/// (`plan`, `payCountry`, `transferNote`, `billFile`, `expireAt`) plus an
/// explicit `stage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr", into = "RecordRepr")]
pub struct SubscriptionRecord {
    /// Epoch milliseconds; `0` means never activated.
    pub expire_at: i64,
    pub stage: Stage,
}

impl SubscriptionRecord {
    /// True once `now` is strictly past `expire_at + grace_ms`.
    #[must_use]
    pub fn is_past_grace(&self, now: i64, grace_ms: i64) -> bool {
        self.expire_at != 0 && now > self.expire_at.saturating_add(grace_ms)
    }

    #[must_use]
    pub fn is_entitled(&self, now: i64) -> bool {
        self.expire_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StageTag {
    Fresh,
    PlanChosen,
    AwaitingPayment,
    BillSubmitted,
    Active,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stage: Option<StageTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pay_country: Option<PayCountry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transfer_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bill_file: Option<String>,
    #[serde(default)]
    expire_at: i64,
}

impl From<SubscriptionRecord> for RecordRepr {
    fn from(record: SubscriptionRecord) -> Self {
        let mut repr = RecordRepr {
            expire_at: record.expire_at,
            ..Default::default()
        };

        let (tag, payment, bill_file) = match record.stage {
            Stage::Fresh => (StageTag::Fresh, None, None),
            Stage::PlanChosen { plan } => {
                repr.plan = Some(plan);
                (StageTag::PlanChosen, None, None)
            }
            Stage::AwaitingPayment { plan, payment } => {
                repr.plan = Some(plan);
                (StageTag::AwaitingPayment, Some(payment), None)
            }
            Stage::BillSubmitted {
                plan,
                payment,
                bill_file,
            } => {
                repr.plan = Some(plan);
                (StageTag::BillSubmitted, Some(payment), Some(bill_file))
            }
            Stage::Active {
                plan,
                payment,
                bill_file,
            } => {
                repr.plan = Some(plan);
                (StageTag::Active, payment, bill_file)
            }
        };

        repr.stage = Some(tag);
        if let Some(payment) = payment {
            repr.pay_country = Some(payment.country);
            repr.transfer_note = Some(payment.transfer_note);
        }
        repr.bill_file = bill_file;
        repr
    }
}

impl TryFrom<RecordRepr> for SubscriptionRecord {
    type Error = String;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        let has_payment = repr.pay_country.is_some() && repr.transfer_note.is_some();
        let tag = repr.stage.unwrap_or_else(|| infer_stage(&repr, has_payment));

        let payment = match (repr.pay_country, repr.transfer_note) {
            (Some(country), Some(transfer_note)) => Some(Payment {
                country,
                transfer_note,
            }),
            _ => None,
        };

        let need_plan = || repr.plan.ok_or_else(|| missing(tag, "plan"));
        let need_payment = || payment.clone().ok_or_else(|| missing(tag, "payCountry/transferNote"));

        let stage = match tag {
            StageTag::Fresh => Stage::Fresh,
            StageTag::PlanChosen => Stage::PlanChosen { plan: need_plan()? },
            StageTag::AwaitingPayment => Stage::AwaitingPayment {
                plan: need_plan()?,
                payment: need_payment()?,
            },
            StageTag::BillSubmitted => Stage::BillSubmitted {
                plan: need_plan()?,
                payment: need_payment()?,
                bill_file: repr.bill_file.clone().ok_or_else(|| missing(tag, "billFile"))?,
            },
            StageTag::Active => Stage::Active {
                plan: need_plan()?,
                payment: payment.clone(),
                bill_file: repr.bill_file.clone(),
            },
        };

        Ok(SubscriptionRecord {
            expire_at: repr.expire_at,
            stage,
        })
    }
}

fn missing(tag: StageTag, field: &str) -> String {
    format!("stage {:?} requires field '{}'", tag, field)
}

/// Stage for snapshots written before the stage was stored explicitly.
fn infer_stage(repr: &RecordRepr, has_payment: bool) -> StageTag {
    match (repr.plan, has_payment, &repr.bill_file) {
        (None, _, _) => StageTag::Fresh,
        (Some(_), false, _) => StageTag::PlanChosen,
        (Some(_), true, Some(_)) if repr.expire_at != 0 => StageTag::Active,
        (Some(_), true, Some(_)) => StageTag::BillSubmitted,
        (Some(_), true, None) => StageTag::AwaitingPayment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_note_is_derived_from_identity() {
        assert_eq!(transfer_note("42"), "DISCORD_42");
        let payment = Payment::for_subscriber("42", PayCountry::Japan);
        assert_eq!(payment.transfer_note, "DISCORD_42");
    }

    #[test]
    fn test_serialized_layout_keeps_legacy_field_names() {
        let record = SubscriptionRecord {
            expire_at: 1_700_000_000_000,
            stage: Stage::BillSubmitted {
                plan: Plan::ShortTerm,
                payment: Payment::for_subscriber("42", PayCountry::Vietnam),
                bill_file: "./uploads/42_1.png".to_string(),
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "bill_submitted");
        assert_eq!(json["plan"], "1m");
        assert_eq!(json["payCountry"], "VN");
        assert_eq!(json["transferNote"], "DISCORD_42");
        assert_eq!(json["billFile"], "./uploads/42_1.png");
        assert_eq!(json["expireAt"], 1_700_000_000_000i64);

        let back: SubscriptionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_fresh_record_serializes_minimally() {
        let json = serde_json::to_string(&SubscriptionRecord::default()).unwrap();
        assert_eq!(json, r#"{"stage":"fresh","expireAt":0}"#);
    }

    #[test]
    fn test_legacy_records_infer_stage() {
        let cases = [
            (r#"{"expireAt":0}"#, "fresh"),
            (r#"{"expireAt":0,"plan":"6m"}"#, "plan_chosen"),
            (
                r#"{"expireAt":0,"plan":"6m","payCountry":"JP","transferNote":"DISCORD_1"}"#,
                "awaiting_payment",
            ),
            (
                r#"{"expireAt":0,"plan":"6m","payCountry":"JP","transferNote":"DISCORD_1","billFile":"./uploads/1_2.jpg"}"#,
                "bill_submitted",
            ),
            (
                r#"{"expireAt":1700000000000,"plan":"1y","payCountry":"VN","transferNote":"DISCORD_1","billFile":"./uploads/1_2.jpg"}"#,
                "active",
            ),
        ];

        for (json, expected) in cases {
            let record: SubscriptionRecord = serde_json::from_str(json).unwrap();
            assert_eq!(record.stage.name(), expected, "{}", json);
        }
    }

    #[test]
    fn test_partial_payment_is_not_a_payment() {
        let record: SubscriptionRecord =
            serde_json::from_str(r#"{"expireAt":0,"plan":"1m","payCountry":"VN"}"#).unwrap();
        assert_eq!(record.stage, Stage::PlanChosen { plan: Plan::ShortTerm });
        assert!(record.stage.payment().is_none());
    }

    #[test]
    fn test_inconsistent_stage_is_rejected() {
        let err = serde_json::from_str::<SubscriptionRecord>(
            r#"{"stage":"bill_submitted","plan":"1m","expireAt":0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("payCountry"));
    }

    #[test]
    fn test_grace_boundary_is_strict() {
        let record = SubscriptionRecord {
            expire_at: 1_000,
            stage: Stage::Fresh,
        };
        assert!(!record.is_past_grace(1_100, 100));
        assert!(record.is_past_grace(1_101, 100));
        assert!(!SubscriptionRecord::default().is_past_grace(i64::MAX, 0));
    }
}
