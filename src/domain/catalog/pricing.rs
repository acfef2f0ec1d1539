use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::errors::PricingError;
use super::value_objects::PriceRule;
use crate::models::{GroupId, ProductId};
use crate::persistence::CatalogReader;

// ============================================================================
// Price Resolution
// ============================================================================
//
// Selection order for one product:
// 1. A rule for one of the caller's groups. Several matches mean the
//    catalogue holds overlapping group prices; the highest group id wins.
// 2. The default rule (no group).
// 3. Any rule of the product, lowest rule id first. This last resort hides
//    catalogue gaps, it does not express a pricing policy.
//
// Rules with a non-positive price never match. A product with no usable rule
// is unpriced and must fail the order line.
//
// ============================================================================

/// How a price was picked, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Group(GroupId),
    Default,
    Fallback,
}

/// Pick the applicable rule out of a product's rules
pub fn select_price_rule<'a>(
    rules: &'a [PriceRule],
    groups: &BTreeSet<GroupId>,
) -> Option<(&'a PriceRule, PriceSource)> {
    let usable = || rules.iter().filter(|rule| rule.price > Decimal::ZERO);

    let group_rule = usable()
        .filter_map(|rule| match rule.group_id {
            Some(group_id) if groups.contains(&group_id) => Some((rule, group_id)),
            _ => None,
        })
        .max_by_key(|(rule, group_id)| (*group_id, Reverse(rule.id)));

    if let Some((rule, group_id)) = group_rule {
        return Some((rule, PriceSource::Group(group_id)));
    }

    if let Some(rule) = usable().filter(|rule| rule.is_default()).min_by_key(|rule| rule.id) {
        return Some((rule, PriceSource::Default));
    }

    usable()
        .min_by_key(|rule| rule.id)
        .map(|rule| (rule, PriceSource::Fallback))
}

/// Resolves unit prices against the catalogue. Pure read, no side effects.
pub struct PriceResolver<C> {
    catalog: Arc<C>,
}

impl<C> Clone for PriceResolver<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
        }
    }
}

impl<C: CatalogReader> PriceResolver<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }

    pub async fn resolve_price(
        &self,
        product_id: ProductId,
        groups: &BTreeSet<GroupId>,
    ) -> Result<Decimal, PricingError> {
        let rules = self.catalog.price_rules_for(product_id).await?;

        match select_price_rule(&rules, groups) {
            Some((rule, source)) => {
                if source == PriceSource::Fallback {
                    tracing::warn!(
                        product_id = %product_id,
                        rule_id = %rule.id,
                        "No group or default price rule, using fallback rule"
                    );
                } else {
                    tracing::debug!(
                        product_id = %product_id,
                        price = %rule.price,
                        source = ?source,
                        "Resolved unit price"
                    );
                }
                Ok(rule.price)
            }
            None => Err(PricingError::NoPrice(product_id)),
        }
    }
}
