//! Text rendering for notifications and status replies

use crate::application::search_registry::TrackedSearch;
use crate::domain::events::NotificationEvent;
use crate::domain::item::ConditionTier;
use crate::domain::marketplace::Marketplace;
use crate::domain::search_key::Destination;
use crate::domain::services::OutboundMessage;

/// Amount with the marketplace currency symbol in its usual position
pub fn format_amount(domain: &str, amount: f64) -> String {
    let Some(marketplace) = Marketplace::from_domain(domain) else {
        return format!("{amount:.2}");
    };
    match marketplace.currency {
        "€" => format!("{amount:.2}€"),
        "¥" => format!("¥{amount:.0}"),
        symbol => format!("{symbol}{amount:.2}"),
    }
}

fn footer(destination: &Destination) -> String {
    match destination {
        Destination::Channel(handle) if handle.starts_with('@') => format!("\n\n📣 More deals in {handle}"),
        _ => String::new(),
    }
}

/// Price-drop message for `New`, used-offer message for the other tiers
pub fn render_event(event: &NotificationEvent) -> OutboundMessage {
    let item = &event.item;
    let price = format_amount(&item.domain, event.price);
    let reference = format_amount(&item.domain, event.reference);

    let text = if event.is_price_drop() {
        format!(
            "⚡️ PRICE DROP\n\n{}\n\n✅ Price: {}\n🚫 Previous: {}\n\n🔗 {}{}",
            item.title,
            price,
            reference,
            item.link,
            footer(&event.destination)
        )
    } else {
        format!(
            "♻️ {}\n\n{}\n\n✅ Price: {}\n🚫 New: {}\n\n🔗 {}{}",
            event.tier.to_string().to_uppercase(),
            item.title,
            price,
            reference,
            item.link,
            footer(&event.destination)
        )
    };

    let message = OutboundMessage::text(text);
    if item.link.is_empty() {
        message
    } else {
        message.with_button("🛒 View offer", item.link.clone())
    }
}

/// One `/status` line. With `strip_destination` the key is shown without
/// its `<destination>/` prefix.
pub fn status_line(entry: &TrackedSearch, strip_destination: bool) -> String {
    let rendered = entry.key.render();
    let key = if strip_destination {
        rendered
            .split_once('/')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or(rendered)
    } else {
        rendered
    };

    match &entry.item {
        Some(item) => {
            let domain = &entry.key.product.domain;
            let used = item
                .prices
                .iter()
                .filter(|(tier, p)| tier.is_used() && *p > 0.0)
                .map(|(_, p)| p)
                .reduce(f64::min);
            let mut line = format!(
                "running {} {} {}",
                key,
                item.link,
                format_amount(domain, item.prices[ConditionTier::New])
            );
            if let Some(used) = used {
                line.push(' ');
                line.push_str(&format_amount(domain, used));
            }
            line
        }
        None => format!("running {key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{Item, PriceVector};

    fn event(tier: ConditionTier, destination: Destination) -> NotificationEvent {
        let mut item = Item::new("B07XJ8C8F5", "es");
        item.title = "Widget".into();
        item.link = "https://www.amazon.es/dp/B07XJ8C8F5".into();
        NotificationEvent {
            destination,
            item,
            tier,
            price: 30.0,
            reference: 45.0,
        }
    }

    #[test]
    fn amounts_follow_marketplace_currency() {
        assert_eq!(format_amount("es", 45.0), "45.00€");
        assert_eq!(format_amount("co.uk", 9.5), "£9.50");
        assert_eq!(format_amount("com.br", 10.0), "R$10.00");
        assert_eq!(format_amount("co.jp", 12800.0), "¥12800");
    }

    #[test]
    fn price_drop_message() {
        let message = render_event(&event(ConditionTier::New, Destination::DirectChat(1)));
        assert!(message.text.starts_with("⚡️ PRICE DROP\n\nWidget"));
        assert!(message.text.contains("✅ Price: 30.00€"));
        assert!(message.text.contains("🚫 Previous: 45.00€"));
        assert!(!message.text.contains("More deals"));
        assert_eq!(message.buttons.len(), 1);
    }

    #[test]
    fn used_offer_message_carries_channel_footer() {
        let message = render_event(&event(ConditionTier::VeryGood, Destination::Channel("@deals".into())));
        assert!(message.text.starts_with("♻️ USED - VERY GOOD"));
        assert!(message.text.contains("🚫 New: 45.00€"));
        assert!(message.text.ends_with("📣 More deals in @deals"));
    }

    #[test]
    fn status_lines() {
        let key: crate::domain::search_key::SearchKey = "@deals/B07XJ8C8F5.es".parse().unwrap();
        let mut item = Item::new("B07XJ8C8F5", "es");
        item.link = "https://www.amazon.es/dp/B07XJ8C8F5".into();
        item.prices = PriceVector::new([50.0, 0.0, 32.0, 30.0, 0.0]);

        let pending = TrackedSearch { key: key.clone(), item: None };
        assert_eq!(status_line(&pending, true), "running B07XJ8C8F5.es");

        let tracked = TrackedSearch { key, item: Some(item) };
        assert_eq!(
            status_line(&tracked, false),
            "running @deals/B07XJ8C8F5.es https://www.amazon.es/dp/B07XJ8C8F5 50.00€ 30.00€"
        );
    }
}
