//! Telegram-ready text for the daily report and for rate change alerts.
//!
//! Tables are drawn with ASCII borders inside `<pre>` blocks so they keep
//! their alignment in chat clients that render a monospace font there.

use crate::core::model::{
    CurrencyRates, HistorySample, Operation, PrayerTimes, WeatherSnapshot,
};
use crate::history::{Direction, FieldChange, RateChange};
use chrono::{DateTime, Local};
use comfy_table::presets::ASCII_FULL;
use comfy_table::{CellAlignment, ContentArrangement, Table};
use html_escape::encode_text;
use std::fmt::Write;

/// Everything the full report shows, already refreshed and merged.
pub struct ReportView<'a> {
    pub weather: &'a WeatherSnapshot,
    pub namaz: &'a PrayerTimes,
    pub rates: &'a CurrencyRates,
    /// Currencies in display order.
    pub currencies: &'a [String],
    pub monitored: &'a str,
    pub operation: Operation,
    pub history: &'a [HistorySample],
}

/// Emoji for an OpenWeather icon code, empty when unknown.
pub fn icon_emoji(code: &str) -> &'static str {
    match code {
        "01d" => "☀️",
        "01n" => "🌙",
        "02d" => "🌤️",
        "02n" | "03d" | "03n" | "04d" | "04n" => "☁️",
        "09d" | "09n" => "🌧️",
        "10d" | "10n" => "🌦️",
        "11d" | "11n" => "⛈️",
        "13d" | "13n" => "❄️",
        "50d" | "50n" => "🌫️",
        _ => "",
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(header.to_vec());
    table
}

fn pre(table: &Table) -> String {
    format!("<pre>{}</pre>", encode_text(&table.to_string()))
}

// Upstream descriptions can be long; the chat layout is narrow.
fn short(text: &str, max: usize) -> String {
    let head: String = text.chars().take(max).collect();
    let mut chars = head.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn full_report(view: &ReportView<'_>, now: &DateTime<Local>) -> String {
    let weather = view.weather;

    let mut current = new_table(&["Updated", "Temp", "Weather"]);
    current.add_row(vec![
        weather.last_upd_weather.clone(),
        format!("{}°C", weather.current.temp.round()),
        short(&weather.current.description, 15),
    ]);

    let mut forecast = new_table(&["Day", "Temp", "Weather"]);
    for day in &weather.forecast {
        forecast.add_row(vec![
            day.day_name.clone(),
            day.temp.clone(),
            format!("{} {}", icon_emoji(&day.icon_code), short(&day.description, 15))
                .trim()
                .to_string(),
        ]);
    }

    let mut rates = new_table(&["Currency", "Buy", "Sale"]);
    for code in view.currencies {
        let (buy, sale) = view
            .rates
            .get(code)
            .map_or(("?", "?"), |pair| (pair.buy.as_str(), pair.sale.as_str()));
        rates.add_row(vec![code.as_str(), buy, sale]);
    }
    for column in rates.column_iter_mut().skip(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    let mut prayers = new_table(&["Prayer", "Time"]);
    for (name, time) in view.namaz.entries() {
        prayers.add_row(vec![name, if time.is_empty() { "?" } else { time }]);
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<b>📅 Report for {}</b>\n",
        now.format("%d.%m.%Y %H:%M")
    );
    let _ = writeln!(
        out,
        "<b>{}Current weather ({}):</b>\n{}\n",
        icon_emoji(&weather.current.icon_code),
        encode_text(&weather.last_upd_weather),
        pre(&current)
    );
    let _ = writeln!(
        out,
        "<b>📊 {}-day forecast:</b>\n{}\n",
        weather.forecast.len(),
        pre(&forecast)
    );
    let _ = writeln!(
        out,
        "<b>💱 Exchange rates ({}):</b>\n{}\n",
        encode_text(&view.rates.last_upd_currency),
        pre(&rates)
    );
    let _ = writeln!(
        out,
        "<b>🕌 Prayer times ({}):</b>\n{}\n",
        encode_text(&view.namaz.last_upd_namaz),
        pre(&prayers)
    );
    if let Some(trend) = trend_line(view.history, view.operation) {
        let _ = writeln!(
            out,
            "<b>📈 {} {} today:</b> {}\n",
            encode_text(view.monitored),
            view.operation,
            trend
        );
    }
    out.push_str("<i>Data is refreshed automatically</i>");
    out
}

/// Summary of today's samples for one side of the quote.
pub fn trend_line(history: &[HistorySample], operation: Operation) -> Option<String> {
    let first = history.first()?;
    let last = history.last()?;
    let values = history.iter().map(|s| operation.pick(s));
    let min = values.clone().fold(f64::INFINITY, f64::min);
    let max = values.fold(f64::NEG_INFINITY, f64::max);
    Some(format!(
        "{:.2} → {:.2} (min {:.2}, max {:.2}, {} samples)",
        operation.pick(first),
        operation.pick(last),
        min,
        max,
        history.len()
    ))
}

fn describe(change: &FieldChange) -> String {
    match change.direction() {
        Direction::Increase => format!("{:+.2} ▲", change.delta),
        Direction::Decrease => format!("{:+.2} ▼", change.delta),
        Direction::Unchanged => "no change".to_string(),
    }
}

pub fn rate_change(change: &RateChange) -> String {
    let mut table = new_table(&["", "Was", "Now", "Change"]);
    for (label, field) in [("Buy", &change.buy), ("Sale", &change.sale)] {
        table.add_row(vec![
            label.to_string(),
            format!("{:.2}", field.previous),
            format!("{:.2}", field.current),
            describe(field),
        ]);
    }
    format!(
        "<b>💱 {} rate changed</b> ({})\n{}",
        encode_text(&change.currency),
        encode_text(&change.timestamp),
        pre(&table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{CurrentConditions, ForecastDay, RatePair};
    use chrono::TimeZone;

    fn sample(buy: f64, sale: f64) -> HistorySample {
        HistorySample {
            timestamp: "16.10.2026 09:00:00".to_string(),
            buy,
            sale,
        }
    }

    #[test]
    fn test_full_report_contains_every_section() {
        let weather = WeatherSnapshot {
            current: CurrentConditions {
                temp: 11.6,
                icon_code: "01d".to_string(),
                description: "clear sky".to_string(),
            },
            forecast: vec![
                ForecastDay {
                    day_name: "Sat".to_string(),
                    temp: "+13".to_string(),
                    icon_code: "10d".to_string(),
                    description: "light rain".to_string(),
                },
                ForecastDay {
                    day_name: "Sun".to_string(),
                    temp: "+9".to_string(),
                    icon_code: "04d".to_string(),
                    description: "fog <dense>".to_string(),
                },
            ],
            last_upd_weather: "16.10.2026 08:00:00".to_string(),
        };
        let namaz = PrayerTimes {
            fajr: "06:32".to_string(),
            sunrise: "08:05".to_string(),
            dhuhr: "13:35".to_string(),
            asr: "16:32".to_string(),
            maghrib: "19:04".to_string(),
            isha: String::new(),
            last_upd_namaz: "16.10.2026 03:00:00".to_string(),
        };
        let mut rates = CurrencyRates::default();
        rates
            .rates
            .insert("USD".to_string(), RatePair::new("475.0", "480.0"));
        rates.last_upd_currency = "from cache, no fresh date".to_string();
        let currencies = vec!["USD".to_string(), "EUR".to_string()];
        let history = vec![sample(475.0, 480.0), sample(476.0, 482.5)];

        let view = ReportView {
            weather: &weather,
            namaz: &namaz,
            rates: &rates,
            currencies: &currencies,
            monitored: "USD",
            operation: Operation::Sale,
            history: &history,
        };
        let now = Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let text = full_report(&view, &now);

        assert!(text.starts_with("<b>📅 Report for 16.10.2026 09:30</b>"));
        assert!(text.contains("☀️Current weather (16.10.2026 08:00:00)"));
        assert!(text.contains("12°C"));
        assert!(text.contains("Clear sky"));
        assert!(text.contains("2-day forecast"));
        assert!(text.contains("🌦️ Light rain"));
        assert!(text.contains("Fog &lt;dense&gt;"), "descriptions must be escaped");
        assert!(text.contains("Exchange rates (from cache, no fresh date)"));
        assert!(text.contains("475.0"));
        assert!(text.contains("| EUR"));
        assert!(text.contains("| Isha"));
        assert!(text.contains("USD sale today:</b> 480.00 → 482.50"));
        assert!(text.ends_with("<i>Data is refreshed automatically</i>"));
    }

    #[test]
    fn test_trend_line_needs_samples() {
        assert!(trend_line(&[], Operation::Buy).is_none());
        let history = vec![sample(470.0, 480.0), sample(468.0, 481.0), sample(471.0, 479.0)];
        assert_eq!(
            trend_line(&history, Operation::Buy).unwrap(),
            "470.00 → 471.00 (min 468.00, max 471.00, 3 samples)"
        );
    }

    #[test]
    fn test_rate_change_message() {
        let change = RateChange {
            currency: "USD".to_string(),
            timestamp: "16.10.2026 10:00:00".to_string(),
            buy: FieldChange::between(475.0, 476.0),
            sale: FieldChange::between(480.0, 479.25),
        };
        let text = rate_change(&change);

        assert!(text.starts_with("<b>💱 USD rate changed</b> (16.10.2026 10:00:00)"));
        assert!(text.contains("+1.00 ▲"));
        assert!(text.contains("-0.75 ▼"));
        assert!(text.contains("479.25"));
    }

    #[test]
    fn test_icon_emoji() {
        assert_eq!(icon_emoji("01n"), "🌙");
        assert_eq!(icon_emoji("04d"), "☁️");
        assert_eq!(icon_emoji("zz"), "");
    }
}
