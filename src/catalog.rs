//! Plan Catalog
//!
//! Static mapping from plan identifier to pricing and feature set, carried in
//! two currency projections: the canonical storage currency and the localized
//! currency the mobile-money network charges in. Immutable after startup.
//!
//! Construction validates every plan against the Currency Converter: the
//! localized price must round-trip to the canonical price within one minor
//! unit, so a misconfigured catalog fails the boot instead of mispricing a
//! subscription.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::currency::CurrencyConverter;
use crate::payments::types::PlanInterval;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Plan catalog is empty")]
    Empty,

    #[error("Duplicate plan id: {0}")]
    DuplicatePlanId(String),

    #[error("Invalid price for plan {plan_id}: {reason}")]
    InvalidPrice { plan_id: String, reason: String },

    #[error("Plan {plan_id} currencies do not match the converter pair")]
    CurrencyMismatch { plan_id: String },

    #[error(
        "Plan {plan_id} localized price does not round-trip: converted {converted}, canonical {canonical}"
    )]
    PriceMismatch {
        plan_id: String,
        converted: String,
        canonical: String,
    },

    #[error("Failed to read plan catalog file {path}: {reason}")]
    File { path: String, reason: String },
}

/// A subscription plan in both currency projections.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: String,
    pub display_name: String,
    pub canonical_price: BigDecimal,
    pub canonical_currency: String,
    pub localized_price: BigDecimal,
    pub localized_currency: String,
    pub interval: PlanInterval,
    pub features: Vec<String>,
}

impl Plan {
    /// Canonical price expressed in minor units (cents), as the card network
    /// denominates intents.
    pub fn canonical_minor_units(&self) -> Option<i64> {
        (&self.canonical_price * BigDecimal::from(100))
            .with_scale(0)
            .to_i64()
    }
}

/// Immutable plan catalog, loaded once at process start.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: BTreeMap<String, Plan>,
}

impl PlanCatalog {
    /// Build a catalog from plan definitions, enforcing the pricing invariants.
    pub fn from_plans(
        plans: Vec<Plan>,
        converter: &CurrencyConverter,
    ) -> Result<Self, CatalogError> {
        if plans.is_empty() {
            return Err(CatalogError::Empty);
        }

        let one_minor_unit = BigDecimal::from_str("0.01").expect("static decimal");
        let mut by_id = BTreeMap::new();

        for plan in plans {
            if plan.canonical_price <= BigDecimal::from(0)
                || plan.localized_price <= BigDecimal::from(0)
            {
                return Err(CatalogError::InvalidPrice {
                    plan_id: plan.id.clone(),
                    reason: "prices must be positive".to_string(),
                });
            }

            if plan.canonical_minor_units().is_none() {
                return Err(CatalogError::InvalidPrice {
                    plan_id: plan.id.clone(),
                    reason: "canonical price out of range".to_string(),
                });
            }

            if plan.canonical_currency != converter.canonical_currency()
                || plan.localized_currency != converter.localized_currency()
            {
                return Err(CatalogError::CurrencyMismatch {
                    plan_id: plan.id.clone(),
                });
            }

            let converted = converter
                .to_canonical(&plan.localized_price, &plan.localized_currency)
                .map_err(|e| CatalogError::InvalidPrice {
                    plan_id: plan.id.clone(),
                    reason: e.to_string(),
                })?;
            if (&converted - &plan.canonical_price).abs() > one_minor_unit {
                return Err(CatalogError::PriceMismatch {
                    plan_id: plan.id.clone(),
                    converted: converted.to_string(),
                    canonical: plan.canonical_price.to_string(),
                });
            }

            let id = plan.id.clone();
            if by_id.insert(id.clone(), plan).is_some() {
                return Err(CatalogError::DuplicatePlanId(id));
            }
        }

        Ok(Self { plans: by_id })
    }

    /// The built-in catalog used when no catalog file is configured.
    pub fn builtin(converter: &CurrencyConverter) -> Result<Self, CatalogError> {
        let canonical = converter.canonical_currency().to_string();
        let localized = converter.localized_currency().to_string();

        let plans = vec![
            Plan {
                id: "normal".to_string(),
                display_name: "Normal".to_string(),
                canonical_price: BigDecimal::from(1000),
                canonical_currency: canonical.clone(),
                localized_price: converter.to_localized(&BigDecimal::from(1000)),
                localized_currency: localized.clone(),
                interval: PlanInterval::Month,
                features: vec![
                    "Daily market briefings".to_string(),
                    "Community dashboard access".to_string(),
                    "One live session per week".to_string(),
                ],
            },
            Plan {
                id: "premium".to_string(),
                display_name: "Premium".to_string(),
                canonical_price: BigDecimal::from(2000),
                canonical_currency: canonical,
                localized_price: converter.to_localized(&BigDecimal::from(2000)),
                localized_currency: localized,
                interval: PlanInterval::Month,
                features: vec![
                    "Daily market briefings".to_string(),
                    "Community dashboard access".to_string(),
                    "Unlimited live sessions".to_string(),
                    "Signal alerts".to_string(),
                    "1:1 mentorship".to_string(),
                ],
            },
        ];

        Self::from_plans(plans, converter)
    }

    /// Load a catalog from a JSON file (see `PLAN_CATALOG_PATH`).
    pub fn from_json_file(
        path: &str,
        converter: &CurrencyConverter,
    ) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::File {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let entries: Vec<PlanFileEntry> =
            serde_json::from_str(&raw).map_err(|e| CatalogError::File {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let plans = entries
            .into_iter()
            .map(|entry| entry.into_plan())
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_plans(plans, converter)
    }

    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(plan_id)
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// On-disk plan shape; prices are decimal strings.
#[derive(Debug, Deserialize)]
struct PlanFileEntry {
    id: String,
    display_name: String,
    canonical_price: String,
    canonical_currency: String,
    localized_price: String,
    localized_currency: String,
    interval: PlanInterval,
    #[serde(default)]
    features: Vec<String>,
}

impl PlanFileEntry {
    fn into_plan(self) -> Result<Plan, CatalogError> {
        let canonical_price =
            BigDecimal::from_str(&self.canonical_price).map_err(|e| CatalogError::InvalidPrice {
                plan_id: self.id.clone(),
                reason: e.to_string(),
            })?;
        let localized_price =
            BigDecimal::from_str(&self.localized_price).map_err(|e| CatalogError::InvalidPrice {
                plan_id: self.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Plan {
            id: self.id,
            display_name: self.display_name,
            canonical_price,
            canonical_currency: self.canonical_currency.to_uppercase(),
            localized_price,
            localized_currency: self.localized_currency.to_uppercase(),
            interval: self.interval,
            features: self.features,
        })
    }
}
