//! Localized message rendering
//!
//! Everything here is pure: the same snapshot and locale always produce the
//! same text, so the dispatcher can be tested against exact strings.

pub mod numbers;
pub mod texts;

pub use numbers::{escape_html, fmt_money, fmt_pct};
pub use texts::{interval_label, texts, Texts};

use crate::models::{Locale, MarketSnapshot, NotificationInterval};

const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Render a market snapshot as an HTML chat message
pub fn render(snapshot: &MarketSnapshot, locale: Locale) -> String {
    let t = texts(locale);

    let trend = match snapshot.change_24h {
        Some(change) if change > 0.0 => "🟢",
        _ => "🔴",
    };
    let rank = snapshot
        .rank
        .map(|r| format!("#{}", r))
        .unwrap_or_else(|| "N/A".to_string());

    let mut out = String::with_capacity(512);
    out.push_str(&format!(
        "🪙 <b>{} ({})</b>\n\n",
        escape_html(&snapshot.name),
        escape_html(&snapshot.symbol.to_uppercase())
    ));
    out.push_str(&format!("💰 <b>{}:</b> {}\n", t.price, fmt_money(snapshot.price, 2)));
    out.push_str(&format!(
        "{} <b>{}:</b> {}\n",
        trend,
        t.change_24h,
        fmt_pct(snapshot.change_24h)
    ));
    out.push_str(&format!("📊 <b>{}:</b> {}\n", t.change_7d, fmt_pct(snapshot.change_7d)));
    out.push_str(&format!("🏆 <b>{}:</b> {}\n", t.rank, rank));
    out.push_str(&format!(
        "📈 <b>{}:</b> {}\n",
        t.market_cap,
        fmt_money(snapshot.market_cap, 0)
    ));
    out.push_str(&format!(
        "💹 <b>{}:</b> {}\n\n",
        t.volume_24h,
        fmt_money(snapshot.volume_24h, 0)
    ));
    out.push_str(&format!(
        "⏰ <i>{}: {} UTC</i>",
        t.updated,
        snapshot.last_updated.format(TIMESTAMP_FORMAT)
    ));

    out
}

/// One-line notice sent when the snapshot could not be fetched (plain text)
pub fn render_unavailable(locale: Locale, asset_id: &str) -> String {
    texts(locale).unavailable.replace("{asset}", asset_id)
}

/// "Change since last update" line, `None` when there is nothing to compare
pub fn render_price_change(locale: Locale, previous: f64, current: f64) -> Option<String> {
    if !previous.is_finite() || !current.is_finite() || previous <= 0.0 {
        return None;
    }

    let change = (current - previous) / previous * 100.0;
    let arrow = if change >= 0.0 { "⬆️" } else { "⬇️" };
    Some(format!(
        "{} <b>{}:</b> {} ({} → {})",
        arrow,
        texts(locale).since_last,
        fmt_pct(Some(change)),
        fmt_money(Some(previous), 2),
        fmt_money(Some(current), 2)
    ))
}

/// Confirmation sent after a subscription is created or replaced
pub fn notification_set(locale: Locale, coin: &str, interval: NotificationInterval) -> String {
    texts(locale)
        .notification_set
        .replace("{coin}", coin)
        .replace("{interval}", interval_label(interval, locale))
}

/// Confirmation sent after a subscription is removed
pub fn notification_removed(locale: Locale, coin: &str) -> String {
    texts(locale).notification_removed.replace("{coin}", coin)
}
