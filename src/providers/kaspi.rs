use super::util::{build_url, decode_json, http_client};
use crate::core::config::RatesProviderConfig;
use crate::core::model::{CurrencyRates, RatePair};
use crate::core::source::{FetchError, FetchResult, RateSource};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

// The aggregate endpoint only answers requests that look like its web client.
// Header names are case-insensitive on the wire and must be lowercase here.
const CLIENT_HEADERS: [(&str, &str); 6] = [
    ("gisauthorized", "false"),
    ("gisinnerrequest", "false"),
    ("gismobileapp", "false"),
    ("glanguage", "ru"),
    ("grole", "1"),
    ("gsystem", "kkz"),
];

#[derive(Debug, Serialize)]
struct RateRequest<'a> {
    use_type: &'static str,
    currency_codes: &'a [String],
    rate_types: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(default)]
    body: Vec<RateItem>,
}

#[derive(Debug, Deserialize)]
struct RateItem {
    currency: String,
    #[serde(flatten)]
    quote: RatePair,
}

pub struct KaspiRateProvider {
    config: RatesProviderConfig,
}

impl KaspiRateProvider {
    pub fn new(config: &RatesProviderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        for (name, value) in CLIENT_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        headers
    }
}

#[async_trait]
impl RateSource for KaspiRateProvider {
    #[instrument(name = "KaspiFetch", skip(self), fields(currencies = ?self.config.currencies))]
    async fn fetch_rates(&self) -> FetchResult<CurrencyRates> {
        let client = http_client(Duration::from_secs(self.config.timeout_secs))?;
        let url = build_url(&self.config.base_url, "", &[])?;
        let request = RateRequest {
            use_type: "32",
            currency_codes: &self.config.currencies,
            rate_types: ["SALE", "BUY"],
        };
        debug!("Requesting exchange rates");

        let response: RateResponse = decode_json(
            client
                .post(url)
                .headers(Self::headers())
                .json(&request)
                .send()
                .await?,
        )
        .await?;

        let rates = CurrencyRates {
            rates: response
                .body
                .into_iter()
                .filter(|item| self.config.currencies.contains(&item.currency))
                .map(|item| (item.currency, item.quote))
                .collect(),
            last_upd_currency: String::new(),
        };

        if rates.rates.is_empty() {
            return Err(FetchError::Empty);
        }
        debug!(count = rates.rates.len(), "Rates decoded");
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_JSON: &str = r#"{
        "body": [
            {"currency": "USD", "buy": 475.5, "sale": 480.0, "rateType": "x"},
            {"currency": "EUR", "buy": "540.1", "sale": "548.9"},
            {"currency": "RUB", "buy": 5.1, "sale": 5.9}
        ],
        "statusCode": 0
    }"#;

    async fn create_mock_server(body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("gsystem", "kkz"))
            .and(body_partial_json(serde_json::json!({
                "use_type": "32",
                "currency_codes": ["USD", "EUR"],
                "rate_types": ["SALE", "BUY"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_fetch_rates_filters_currencies() {
        let mock_server = create_mock_server(MOCK_JSON).await;
        let config = RatesProviderConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        };

        let rates = KaspiRateProvider::new(&config).fetch_rates().await.unwrap();

        assert_eq!(rates.rates.len(), 2);
        assert_eq!(rates.get("USD"), Some(&RatePair::new("475.5", "480.0")));
        assert_eq!(rates.get("EUR"), Some(&RatePair::new("540.1", "548.9")));
        assert!(rates.get("RUB").is_none());
    }

    #[tokio::test]
    async fn test_no_matching_currency_is_empty() {
        let mock_server =
            create_mock_server(r#"{"body": [{"currency": "RUB", "buy": 5.1, "sale": 5.9}]}"#)
                .await;
        let config = RatesProviderConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        };

        let err = KaspiRateProvider::new(&config)
            .fetch_rates()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty));
    }

    #[tokio::test]
    async fn test_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;
        let config = RatesProviderConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        };

        let err = KaspiRateProvider::new(&config)
            .fetch_rates()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 503));
    }
}
