//! Plan catalog.
//!
//! The three subscription plans, their prices on each payment rail, their
//! duration, and the platform roles they grant.
//!
//! ```rust,ignore
//! use tollgate::plans::{Plan, PlanCatalog};
//!
//! let catalog = PlanCatalog::builder()
//!     .plan(Plan::ShortTerm)
//!         .final_role("111")
//!         .waiting_role("211")
//!         .done()
//!     .plan(Plan::MidTerm)
//!         .final_role("116")
//!         .waiting_role("216")
//!         .done()
//!     .plan(Plan::LongTerm)
//!         .final_role("112")
//!         .waiting_role("212")
//!         .done()
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TollgateError};

/// Platform role identifier (a Discord snowflake).
pub type RoleId = String;

/// Platform user identifier (a Discord snowflake).
pub type UserId = String;

/// A purchasable subscription plan.
///
/// Serialized with the short codes used on buttons and in the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    /// One month.
    #[serde(rename = "1m")]
    ShortTerm,
    /// Six months.
    #[serde(rename = "6m")]
    MidTerm,
    /// Twelve months.
    #[serde(rename = "1y")]
    LongTerm,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::ShortTerm, Plan::MidTerm, Plan::LongTerm];

    /// Button and storage code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ShortTerm => "1m",
            Self::MidTerm => "6m",
            Self::LongTerm => "1y",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Calendar months granted by one approval.
    #[must_use]
    pub fn months(self) -> u32 {
        match self {
            Self::ShortTerm => 1,
            Self::MidTerm => 6,
            Self::LongTerm => 12,
        }
    }

    /// Human readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ShortTerm => "1 month",
            Self::MidTerm => "6 months",
            Self::LongTerm => "1 year",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::ShortTerm => 0,
            Self::MidTerm => 1,
            Self::LongTerm => 2,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// The payment rail a subscriber pays through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayCountry {
    /// Domestic bank transfer in VND, with a VietQR payload.
    #[serde(rename = "VN")]
    Vietnam,
    /// Bank transfer in JPY.
    #[serde(rename = "JP")]
    Japan,
}

impl PayCountry {
    pub const ALL: [PayCountry; 2] = [PayCountry::Vietnam, PayCountry::Japan];

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Vietnam => "VN",
            Self::Japan => "JP",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }

    #[must_use]
    pub fn currency(self) -> &'static str {
        match self {
            Self::Vietnam => "VND",
            Self::Japan => "JPY",
        }
    }

    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            Self::Vietnam => "🇻🇳",
            Self::Japan => "🇯🇵",
        }
    }
}

impl std::fmt::Display for PayCountry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Configuration for a single plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    pub plan: Plan,
    /// Price in VND.
    pub price_vnd: u64,
    /// Price in JPY.
    pub price_jpy: u64,
    /// Role granted once the operator approves the bill.
    pub final_role: RoleId,
    /// Role shown while the bill waits for review.
    pub waiting_role: RoleId,
}

impl PlanConfig {
    #[must_use]
    pub fn price(&self, country: PayCountry) -> u64 {
        match country {
            PayCountry::Vietnam => self.price_vnd,
            PayCountry::Japan => self.price_jpy,
        }
    }
}

/// Static plan table, immutable for the process lifetime.
///
/// Every [`Plan`] is guaranteed to have an entry, so lookups cannot fail.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: [PlanConfig; 3],
}

impl PlanCatalog {
    #[must_use]
    pub fn builder() -> PlanCatalogBuilder {
        PlanCatalogBuilder::new()
    }

    #[must_use]
    pub fn get(&self, plan: Plan) -> &PlanConfig {
        &self.plans[plan.index()]
    }

    #[must_use]
    pub fn months_for(&self, plan: Plan) -> u32 {
        plan.months()
    }

    #[must_use]
    pub fn price(&self, plan: Plan, country: PayCountry) -> u64 {
        self.get(plan).price(country)
    }

    #[must_use]
    pub fn final_role(&self, plan: Plan) -> &str {
        &self.get(plan).final_role
    }

    #[must_use]
    pub fn waiting_role(&self, plan: Plan) -> &str {
        &self.get(plan).waiting_role
    }

    /// Every role the catalog manages: all final roles and all waiting roles.
    #[must_use]
    pub fn role_universe(&self) -> Vec<RoleId> {
        let mut roles: Vec<RoleId> = Vec::with_capacity(6);
        for config in &self.plans {
            for role in [&config.final_role, &config.waiting_role] {
                if !roles.contains(role) {
                    roles.push(role.clone());
                }
            }
        }
        roles
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanConfig> {
        self.plans.iter()
    }
}

fn default_prices(plan: Plan) -> (u64, u64) {
    match plan {
        Plan::ShortTerm => (2_000_000, 12_000),
        Plan::MidTerm => (10_000_000, 60_000),
        Plan::LongTerm => (18_000_000, 108_000),
    }
}

/// Builder for [`PlanCatalog`].
#[derive(Debug, Default)]
#[must_use = "builder does nothing until you call build()"]
pub struct PlanCatalogBuilder {
    entries: [Option<PlanEntry>; 3],
}

#[derive(Debug, Clone)]
struct PlanEntry {
    price_vnd: u64,
    price_jpy: u64,
    final_role: Option<RoleId>,
    waiting_role: Option<RoleId>,
}

impl PlanCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start configuring a plan.
    pub fn plan(self, plan: Plan) -> PlanEntryBuilder {
        let (price_vnd, price_jpy) = default_prices(plan);
        let entry = self.entries[plan.index()].clone().unwrap_or(PlanEntry {
            price_vnd,
            price_jpy,
            final_role: None,
            waiting_role: None,
        });
        PlanEntryBuilder {
            parent: self,
            plan,
            entry,
        }
    }

    /// Build the catalog.
    ///
    /// Fails if any plan is missing or lacks one of its roles.
    pub fn build(self) -> Result<PlanCatalog> {
        let mut built = Vec::with_capacity(3);
        for plan in Plan::ALL {
            let entry = self.entries[plan.index()].clone().ok_or_else(|| {
                TollgateError::config(format!("plan '{}' is not configured", plan))
            })?;
            let final_role = entry.final_role.ok_or_else(|| {
                TollgateError::config(format!("plan '{}' has no final role", plan))
            })?;
            let waiting_role = entry.waiting_role.ok_or_else(|| {
                TollgateError::config(format!("plan '{}' has no waiting role", plan))
            })?;
            built.push(PlanConfig {
                plan,
                price_vnd: entry.price_vnd,
                price_jpy: entry.price_jpy,
                final_role,
                waiting_role,
            });
        }

        let plans: [PlanConfig; 3] = built
            .try_into()
            .map_err(|_| TollgateError::internal("plan table has the wrong size"))?;
        Ok(PlanCatalog { plans })
    }
}

/// Builder for one plan inside a [`PlanCatalogBuilder`].
#[must_use = "call done() to return to the catalog builder"]
pub struct PlanEntryBuilder {
    parent: PlanCatalogBuilder,
    plan: Plan,
    entry: PlanEntry,
}

impl PlanEntryBuilder {
    pub fn final_role(mut self, role: impl Into<RoleId>) -> Self {
        self.entry.final_role = Some(role.into());
        self
    }

    pub fn waiting_role(mut self, role: impl Into<RoleId>) -> Self {
        self.entry.waiting_role = Some(role.into());
        self
    }

    pub fn prices(mut self, vnd: u64, jpy: u64) -> Self {
        self.entry.price_vnd = vnd;
        self.entry.price_jpy = jpy;
        self
    }

    pub fn done(mut self) -> PlanCatalogBuilder {
        self.parent.entries[self.plan.index()] = Some(self.entry);
        self.parent
    }
}

/// Catalog used by unit tests across the crate.
#[cfg(any(test, feature = "test-platform"))]
pub mod test {
    use super::*;

    pub const FINAL_1M: &str = "role-final-1m";
    pub const FINAL_6M: &str = "role-final-6m";
    pub const FINAL_1Y: &str = "role-final-1y";
    pub const WAIT_1M: &str = "role-wait-1m";
    pub const WAIT_6M: &str = "role-wait-6m";
    pub const WAIT_1Y: &str = "role-wait-1y";

    /// A fully configured catalog with recognisable role ids.
    pub fn catalog() -> PlanCatalog {
        PlanCatalog::builder()
            .plan(Plan::ShortTerm)
            .final_role(FINAL_1M)
            .waiting_role(WAIT_1M)
            .done()
            .plan(Plan::MidTerm)
            .final_role(FINAL_6M)
            .waiting_role(WAIT_6M)
            .done()
            .plan(Plan::LongTerm)
            .final_role(FINAL_1Y)
            .waiting_role(WAIT_1Y)
            .done()
            .build()
            .expect("test catalog is complete")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_months_for() {
        let catalog = test::catalog();
        assert_eq!(catalog.months_for(Plan::ShortTerm), 1);
        assert_eq!(catalog.months_for(Plan::MidTerm), 6);
        assert_eq!(catalog.months_for(Plan::LongTerm), 12);
    }

    #[test]
    fn test_plan_codes() {
        for plan in Plan::ALL {
            assert_eq!(Plan::from_code(plan.code()), Some(plan));
        }
        assert_eq!(Plan::from_code("3m"), None);
        assert_eq!(PayCountry::from_code("vn"), Some(PayCountry::Vietnam));
        assert_eq!(PayCountry::from_code("US"), None);
    }

    #[test]
    fn test_default_prices() {
        let catalog = test::catalog();
        assert_eq!(catalog.price(Plan::ShortTerm, PayCountry::Vietnam), 2_000_000);
        assert_eq!(catalog.price(Plan::MidTerm, PayCountry::Japan), 60_000);
        assert_eq!(catalog.price(Plan::LongTerm, PayCountry::Vietnam), 18_000_000);
    }

    #[test]
    fn test_price_override() {
        let catalog = PlanCatalog::builder()
            .plan(Plan::ShortTerm)
            .final_role("a")
            .waiting_role("b")
            .prices(100, 1)
            .done()
            .plan(Plan::MidTerm)
            .final_role("c")
            .waiting_role("d")
            .done()
            .plan(Plan::LongTerm)
            .final_role("e")
            .waiting_role("f")
            .done()
            .build()
            .unwrap();
        assert_eq!(catalog.price(Plan::ShortTerm, PayCountry::Vietnam), 100);
        assert_eq!(catalog.price(Plan::ShortTerm, PayCountry::Japan), 1);
    }

    #[test]
    fn test_role_universe_contains_every_role_once() {
        let catalog = test::catalog();
        let universe = catalog.role_universe();
        assert_eq!(universe.len(), 6);
        for role in [
            test::FINAL_1M,
            test::FINAL_6M,
            test::FINAL_1Y,
            test::WAIT_1M,
            test::WAIT_6M,
            test::WAIT_1Y,
        ] {
            assert!(universe.iter().any(|r| r == role));
        }
    }

    #[test]
    fn test_build_rejects_missing_roles() {
        let err = PlanCatalog::builder()
            .plan(Plan::ShortTerm)
            .final_role("a")
            .done()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no waiting role"));

        let err = PlanCatalog::builder()
            .plan(Plan::ShortTerm)
            .final_role("a")
            .waiting_role("b")
            .done()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'6m' is not configured"));
    }

    #[test]
    fn test_plan_serde_uses_codes() {
        assert_eq!(serde_json::to_string(&Plan::LongTerm).unwrap(), "\"1y\"");
        let country: PayCountry = serde_json::from_str("\"JP\"").unwrap();
        assert_eq!(country, PayCountry::Japan);
    }
}
