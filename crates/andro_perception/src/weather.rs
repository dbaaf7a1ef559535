use andro_core::config::WeatherConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("no position fix configured")]
    NoPosition,
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("weather service answered {0}")]
    Status(u16),
    #[error("response carried no weather code")]
    MissingCode,
}

/// Current-conditions lookup. Codes follow the WMO weather interpretation table.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_code(&self) -> Result<u16, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    weather_code: Option<u16>,
}

/// Open-Meteo forecast API, current weather code only.
pub struct OpenMeteoProvider {
    client: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl OpenMeteoProvider {
    pub fn new(
        base_url: &str,
        latitude: f64,
        longitude: f64,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            latitude,
            longitude,
        })
    }

    /// Build from config. Without a position fix the weather feature stays off.
    pub fn from_config(cfg: &WeatherConfig) -> Result<Self, WeatherError> {
        let (latitude, longitude) = cfg.position().ok_or(WeatherError::NoPosition)?;
        Self::new(
            &cfg.base_url,
            latitude,
            longitude,
            Duration::from_secs(cfg.timeout_secs.max(1)),
        )
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn current_code(&self) -> Result<u16, WeatherError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("current", "weather_code".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status().as_u16()));
        }

        let body: ForecastResponse = response.json().await?;
        let code = body
            .current
            .and_then(|c| c.weather_code)
            .ok_or(WeatherError::MissingCode)?;
        tracing::debug!("Weather code {}", code);
        Ok(code)
    }
}
