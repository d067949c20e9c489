use crate::models::{Locale, NotificationInterval};

/// Fixed strings of one locale
#[derive(Debug)]
pub struct Texts {
    pub price: &'static str,
    pub change_24h: &'static str,
    pub change_7d: &'static str,
    pub rank: &'static str,
    pub market_cap: &'static str,
    pub volume_24h: &'static str,
    pub updated: &'static str,
    pub since_last: &'static str,
    /// `{asset}` is replaced with the asset id
    pub unavailable: &'static str,
    /// `{coin}` and `{interval}` are replaced
    pub notification_set: &'static str,
    pub notification_removed: &'static str,
    /// Interval labels in `NotificationInterval::ALL` order
    pub intervals: [&'static str; 7],
}

static RU: Texts = Texts {
    price: "Цена",
    change_24h: "Изменение 24ч",
    change_7d: "Изменение 7д",
    rank: "Ранг",
    market_cap: "Рын. капитализация",
    volume_24h: "Объем 24ч",
    updated: "Обновлено",
    since_last: "С последнего уведомления",
    unavailable: "⚠️ Произошла ошибка при получении данных ({asset}). Попробуем снова при следующем обновлении.",
    notification_set: "Уведомления настроены для {coin} каждые {interval}",
    notification_removed: "Уведомления для {coin} отключены",
    intervals: [
        "15 минут", "30 минут", "1 час", "3 часа", "6 часов", "12 часов", "24 часа",
    ],
};

static EN: Texts = Texts {
    price: "Price",
    change_24h: "24h Change",
    change_7d: "7d Change",
    rank: "Rank",
    market_cap: "Market Cap",
    volume_24h: "24h Volume",
    updated: "Updated",
    since_last: "Since last update",
    unavailable: "⚠️ Error occurred while fetching data ({asset}). We will try again at the next update.",
    notification_set: "Notifications set for {coin} every {interval}",
    notification_removed: "Notifications for {coin} turned off",
    intervals: [
        "15 minutes", "30 minutes", "1 hour", "3 hours", "6 hours", "12 hours", "24 hours",
    ],
};

static DE: Texts = Texts {
    price: "Preis",
    change_24h: "24h Änderung",
    change_7d: "7d Änderung",
    rank: "Rang",
    market_cap: "Marktkapitalisierung",
    volume_24h: "24h Volumen",
    updated: "Aktualisiert",
    since_last: "Seit letzter Benachrichtigung",
    unavailable: "⚠️ Fehler beim Abrufen der Daten ({asset}). Wir versuchen es beim nächsten Update erneut.",
    notification_set: "Benachrichtigungen für {coin} alle {interval} eingestellt",
    notification_removed: "Benachrichtigungen für {coin} deaktiviert",
    intervals: [
        "15 Minuten", "30 Minuten", "1 Stunde", "3 Stunden", "6 Stunden", "12 Stunden",
        "24 Stunden",
    ],
};

pub fn texts(locale: Locale) -> &'static Texts {
    match locale {
        Locale::Ru => &RU,
        Locale::En => &EN,
        Locale::De => &DE,
    }
}

/// Human label of an interval ("1 hour", "1 Stunde", ...)
pub fn interval_label(interval: NotificationInterval, locale: Locale) -> &'static str {
    let index = NotificationInterval::ALL
        .iter()
        .position(|i| *i == interval)
        .unwrap_or(0);
    texts(locale).intervals[index]
}
