// Reminder message composition

use crate::domain::{QueueEntry, ShopConfig};

/// Text of the "almost your turn" reminder.
///
/// `provider_name` is appended when the entry requested a provider whose name
/// is known.
pub fn reminder_text(
    entry: &QueueEntry,
    shop: &ShopConfig,
    estimated_wait: u32,
    provider_name: Option<&str>,
) -> String {
    let with_provider = provider_name
        .map(|name| format!(" with {}", name))
        .unwrap_or_default();
    format!(
        "Hi {}, you're ~{} minutes away from your turn at {}{}!",
        entry.customer_name, estimated_wait, shop.name, with_provider
    )
}

/// Phone number safe for logs: everything but the last four digits hidden
pub fn mask_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
