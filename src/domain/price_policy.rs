//! Price decision policy
//!
//! Converts a fresh [`ProductSnapshot`] plus the stored [`Item`] into the
//! updated item and the list of tiers worth notifying about.

use crate::domain::item::{ConditionTier, Item, ProductSnapshot};
use crate::domain::search_key::ProductRef;

/// One tier that crossed its notification threshold
#[derive(Debug, Clone, PartialEq)]
pub struct TierAlert {
    pub tier: ConditionTier,
    pub price: f64,
    /// Reference price the alert is measured against: the previous all-time
    /// minimum for `New`, the current new-condition minimum for used tiers
    pub reference: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceDecision {
    /// Item with the snapshot merged in; always written back
    pub item: Item,
    pub alerts: Vec<TierAlert>,
}

/// Evaluate a snapshot against the stored state.
///
/// `stored` is `None` (or has a zero `min_price`) on the first successful
/// extraction, which only establishes the baseline for the `New` tier.
pub fn evaluate(
    product: &ProductRef,
    stored: Option<&Item>,
    snapshot: &ProductSnapshot,
    max_tier: ConditionTier,
) -> PriceDecision {
    let mut item = stored
        .cloned()
        .unwrap_or_else(|| Item::new(&product.code, &product.domain));
    item.id.clone_from(&product.code);
    item.domain.clone_from(&product.domain);
    item.title.clone_from(&snapshot.title);
    item.link.clone_from(&snapshot.link);

    let previous = item.prices;
    let previous_min = item.min_price;
    let first_run = previous_min <= 0.0;

    let new_price = snapshot.prices[ConditionTier::New];
    let new_min = new_price > 0.0 && (previous_min <= 0.0 || new_price < previous_min);
    if new_min {
        item.min_price = new_price;
    }
    item.prices = snapshot.prices;

    let mut alerts = Vec::new();
    for tier in ConditionTier::up_to(max_tier) {
        let price = snapshot.prices[tier];
        if price <= 0.0 {
            continue;
        }
        if tier == ConditionTier::New {
            if first_run || !new_min {
                continue;
            }
            alerts.push(TierAlert {
                tier,
                price,
                reference: previous_min,
            });
            continue;
        }
        let before = previous[tier];
        if before > 0.0 && price >= before {
            continue;
        }
        if item.min_price > 0.0 && price >= item.min_price {
            continue;
        }
        alerts.push(TierAlert {
            tier,
            price,
            reference: item.min_price,
        });
    }

    PriceDecision { item, alerts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::PriceVector;

    fn product() -> ProductRef {
        ProductRef {
            code: "B07XJ8C8F5".into(),
            domain: "es".into(),
        }
    }

    fn snapshot(prices: [f64; 5]) -> ProductSnapshot {
        ProductSnapshot {
            title: "Widget".into(),
            link: "https://www.amazon.es/dp/B07XJ8C8F5".into(),
            prices: PriceVector::new(prices),
        }
    }

    fn stored(min_price: f64, prices: [f64; 5]) -> Item {
        let mut item = Item::new("B07XJ8C8F5", "es");
        item.min_price = min_price;
        item.prices = PriceVector::new(prices);
        item
    }

    #[test]
    fn new_minimum_and_cheaper_used_offer_both_alert() {
        let item = stored(50.0, [50.0, 0.0, 0.0, 0.0, 0.0]);
        let decision = evaluate(
            &product(),
            Some(&item),
            &snapshot([45.0, 30.0, 0.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );

        assert_eq!(decision.item.min_price, 45.0);
        assert_eq!(
            decision.alerts,
            vec![
                TierAlert { tier: ConditionTier::New, price: 45.0, reference: 50.0 },
                TierAlert { tier: ConditionTier::LikeNew, price: 30.0, reference: 45.0 },
            ]
        );
    }

    #[test]
    fn used_offer_above_new_minimum_is_skipped() {
        let item = stored(50.0, [50.0, 0.0, 0.0, 0.0, 0.0]);
        let decision = evaluate(
            &product(),
            Some(&item),
            &snapshot([45.0, 46.0, 0.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );
        let tiers: Vec<_> = decision.alerts.iter().map(|a| a.tier).collect();
        assert_eq!(tiers, vec![ConditionTier::New]);
    }

    #[test]
    fn first_extraction_only_sets_baseline() {
        let decision = evaluate(
            &product(),
            None,
            &snapshot([20.0, 0.0, 0.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );
        assert!(decision.alerts.is_empty());
        assert_eq!(decision.item.min_price, 20.0);
        assert_eq!(decision.item.title, "Widget");
        assert_eq!(decision.item.prices[ConditionTier::New], 20.0);
    }

    #[test]
    fn higher_new_price_never_raises_minimum() {
        let item = stored(30.0, [30.0, 0.0, 0.0, 0.0, 0.0]);
        let decision = evaluate(
            &product(),
            Some(&item),
            &snapshot([35.0, 0.0, 0.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );
        assert!(decision.alerts.is_empty());
        assert_eq!(decision.item.min_price, 30.0);
        assert_eq!(decision.item.prices[ConditionTier::New], 35.0);
    }

    #[test]
    fn missing_new_offer_keeps_minimum() {
        let item = stored(30.0, [30.0, 0.0, 0.0, 0.0, 0.0]);
        let decision = evaluate(
            &product(),
            Some(&item),
            &snapshot([0.0, 0.0, 25.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );
        assert_eq!(decision.item.min_price, 30.0);
        assert_eq!(decision.alerts.len(), 1);
        assert_eq!(decision.alerts[0].tier, ConditionTier::VeryGood);
    }

    #[test]
    fn used_price_must_drop_below_previous_observation() {
        let item = stored(50.0, [50.0, 0.0, 20.0, 0.0, 0.0]);
        let same = evaluate(
            &product(),
            Some(&item),
            &snapshot([50.0, 0.0, 20.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );
        assert!(same.alerts.is_empty());

        let lower = evaluate(
            &product(),
            Some(&item),
            &snapshot([50.0, 0.0, 18.0, 0.0, 0.0]),
            ConditionTier::WORST,
        );
        assert_eq!(lower.alerts.len(), 1);
        assert_eq!(lower.alerts[0].price, 18.0);
    }

    #[test]
    fn tier_cap_limits_alerts() {
        let item = stored(50.0, [50.0, 0.0, 0.0, 0.0, 0.0]);
        let decision = evaluate(
            &product(),
            Some(&item),
            &snapshot([50.0, 0.0, 0.0, 10.0, 0.0]),
            ConditionTier::VeryGood,
        );
        assert!(decision.alerts.is_empty());
        // the full vector is still recorded
        assert_eq!(decision.item.prices[ConditionTier::Good], 10.0);
    }

    #[test]
    fn used_alerts_never_at_or_above_minimum() {
        let item = stored(40.0, [40.0, 0.0, 0.0, 0.0, 0.0]);
        for used in [39.99, 40.0, 41.0] {
            let decision = evaluate(
                &product(),
                Some(&item),
                &snapshot([40.0, used, 0.0, 0.0, 0.0]),
                ConditionTier::WORST,
            );
            for alert in decision.alerts {
                assert!(alert.price < decision.item.min_price);
            }
        }
    }
}
