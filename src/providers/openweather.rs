use super::util::{build_url, decode_json, http_client};
use crate::core::config::WeatherProviderConfig;
use crate::core::model::{CurrentConditions, ForecastDay, WeatherSnapshot};
use crate::core::source::{FetchError, FetchResult, WeatherSource};
use async_trait::async_trait;
use chrono::{DateTime, Days, Local, NaiveDate, Timelike, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

const FORECAST_DAYS: u64 = 3;

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    icon: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: Main,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    dt: i64,
    main: Main,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastItem>,
}

pub struct OpenWeatherProvider {
    config: WeatherProviderConfig,
}

impl OpenWeatherProvider {
    pub fn new(config: &WeatherProviderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.config.city_id.clone()),
            ("units", self.config.units.clone()),
            ("lang", self.config.lang.clone()),
            ("APPID", self.config.api_key.clone()),
        ]
    }
}

/// Picks, for each of the days after `today`, the 3-hour slot closest to
/// midday UTC.
fn build_forecast(items: &[ForecastItem], today: NaiveDate) -> Vec<ForecastDay> {
    let mut buckets: BTreeMap<NaiveDate, Vec<(DateTime<Utc>, &ForecastItem)>> = BTreeMap::new();
    for item in items {
        if let Some(at) = DateTime::from_timestamp(item.dt, 0) {
            buckets.entry(at.date_naive()).or_default().push((at, item));
        }
    }

    (1..=FORECAST_DAYS)
        .filter_map(|offset| {
            let day = today.checked_add_days(Days::new(offset))?;
            let (_, midday) = buckets
                .get(&day)?
                .iter()
                .min_by_key(|(at, _)| at.hour().abs_diff(12))?;
            let condition = midday.weather.first()?;
            Some(ForecastDay {
                day_name: day.format("%a").to_string(),
                temp: format!("{:+.0}", midday.main.temp),
                icon_code: condition.icon.clone(),
                description: condition.description.clone(),
            })
        })
        .collect()
}

#[async_trait]
impl WeatherSource for OpenWeatherProvider {
    #[instrument(name = "OpenWeatherFetch", skip(self), fields(city = %self.config.city_id))]
    async fn fetch_weather(&self) -> FetchResult<WeatherSnapshot> {
        let client = http_client(Duration::from_secs(self.config.timeout_secs))?;
        let params = self.params();

        let url = build_url(&self.config.base_url, "/data/2.5/weather", &params)?;
        debug!("Requesting current weather");
        let current: CurrentResponse = decode_json(client.get(url).send().await?).await?;

        let url = build_url(&self.config.base_url, "/data/2.5/forecast", &params)?;
        debug!("Requesting forecast");
        let forecast: ForecastResponse = decode_json(client.get(url).send().await?).await?;

        let condition = current
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Malformed("current weather has no conditions".into()))?;

        let snapshot = WeatherSnapshot {
            current: CurrentConditions {
                temp: current.main.temp,
                icon_code: condition.icon,
                description: condition.description,
            },
            forecast: build_forecast(&forecast.list, Local::now().date_naive()),
            last_upd_weather: String::new(),
        };
        debug!(days = snapshot.forecast.len(), "Weather decoded");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn slot(day: u32, hour: u32, temp: f64, icon: &str, descr: &str) -> String {
        let dt = Utc
            .with_ymd_and_hms(2026, 10, day, hour, 0, 0)
            .unwrap()
            .timestamp();
        format!(
            r#"{{"dt": {dt}, "main": {{"temp": {temp}}}, "weather": [{{"icon": "{icon}", "description": "{descr}"}}]}}"#
        )
    }

    fn forecast_json() -> String {
        let slots = [
            slot(16, 12, 10.0, "01d", "today, ignored"),
            slot(17, 9, 11.2, "02d", "few clouds"),
            slot(17, 12, 13.4, "10d", "light rain"),
            slot(17, 15, 12.0, "04d", "overcast"),
            slot(18, 0, -1.4, "13n", "snow"),
            slot(18, 21, 2.0, "01n", "clear sky"),
            slot(19, 12, 5.0, "50d", "mist"),
            slot(20, 12, 8.0, "01d", "beyond range"),
        ];
        format!(r#"{{"list": [{}]}}"#, slots.join(","))
    }

    #[test]
    fn test_forecast_takes_midday_slot_of_next_three_days() {
        let parsed: ForecastResponse = serde_json::from_str(&forecast_json()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let days = build_forecast(&parsed.list, today);

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].day_name, "Sat");
        assert_eq!(days[0].temp, "+13");
        assert_eq!(days[0].icon_code, "10d");
        assert_eq!(days[1].day_name, "Sun");
        assert_eq!(days[1].temp, "+2");
        assert_eq!(days[1].description, "clear sky");
        assert_eq!(days[2].day_name, "Mon");
        assert_eq!(days[2].description, "mist");
    }

    #[test]
    fn test_forecast_skips_days_without_slots() {
        let parsed: ForecastResponse = serde_json::from_str(&forecast_json()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        let days = build_forecast(&parsed.list, today);
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].description, "beyond range");
    }

    #[tokio::test]
    async fn test_fetch_weather() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("id", "2994160"))
            .and(query_param("APPID", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"main": {"temp": 11.6}, "weather": [{"icon": "04d", "description": "broken clouds"}]}"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string(forecast_json()))
            .mount(&mock_server)
            .await;

        let config = WeatherProviderConfig {
            base_url: mock_server.uri(),
            api_key: "key".to_string(),
            ..Default::default()
        };
        let snapshot = OpenWeatherProvider::new(&config).fetch_weather().await.unwrap();

        assert_eq!(snapshot.current.temp, 11.6);
        assert_eq!(snapshot.current.icon_code, "04d");
        assert_eq!(snapshot.current.description, "broken clouds");
        assert!(snapshot.forecast.len() <= 3);
        assert!(snapshot.last_upd_weather.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_a_status_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"cod": 401}"#))
            .mount(&mock_server)
            .await;

        let config = WeatherProviderConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        };
        let err = OpenWeatherProvider::new(&config)
            .fetch_weather()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 401));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"main": {}}"#))
            .mount(&mock_server)
            .await;

        let config = WeatherProviderConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        };
        let err = OpenWeatherProvider::new(&config)
            .fetch_weather()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
