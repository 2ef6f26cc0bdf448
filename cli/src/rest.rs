use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;

use platter_core::api::MealPlanApi;
use platter_core::models::{DATE_FORMAT, MealPlanDay, MealPlanDayDto, PantryItem, PersistAck};

use crate::config::Config;

/// Meal plan backend over HTTP.
pub struct RestPlanApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestPlanApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "platter-cli/{} (meal planner)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[async_trait]
impl MealPlanApi for RestPlanApi {
    async fn fetch_day_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: &str,
    ) -> Result<Vec<MealPlanDay>> {
        let (from, to) = (format_date(from), format_date(to));
        let resp = self
            .authorized(self.client.get(self.url("meal-plans")))
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("userId", user_id),
            ])
            .send()
            .await
            .context("Failed to reach meal plan API")?
            .error_for_status()
            .context("Meal plan API rejected range request")?;

        resp.json()
            .await
            .context("Failed to parse meal plan range response")
    }

    async fn fetch_single_day(
        &self,
        date: NaiveDate,
        user_id: &str,
    ) -> Result<Option<MealPlanDay>> {
        let url = self.url(&format!("meal-plans/{}", format_date(date)));
        let resp = self
            .authorized(self.client.get(&url))
            .query(&[("userId", user_id)])
            .send()
            .await
            .context("Failed to reach meal plan API")?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let day = resp
            .error_for_status()
            .context("Meal plan API rejected day request")?
            .json()
            .await
            .context("Failed to parse meal plan response")?;
        Ok(Some(day))
    }

    async fn persist_day(&self, dto: &MealPlanDayDto) -> Result<PersistAck> {
        let url = self.url(&format!("meal-plans/{}", dto.date));
        self.authorized(self.client.put(&url))
            .json(dto)
            .send()
            .await
            .context("Failed to reach meal plan API")?
            .error_for_status()
            .with_context(|| format!("Meal plan API rejected save of {}", dto.date))?
            .json()
            .await
            .context("Failed to parse save response")
    }

    async fn consume_pantry_items(&self, items: &[PantryItem]) -> Result<PersistAck> {
        #[derive(Serialize)]
        struct ConsumeRequest<'a> {
            items: &'a [PantryItem],
        }

        self.authorized(self.client.post(self.url("pantry/consume")))
            .json(&ConsumeRequest { items })
            .send()
            .await
            .context("Failed to reach pantry API")?
            .error_for_status()
            .context("Pantry API rejected consume request")?
            .json()
            .await
            .context("Failed to parse pantry response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> RestPlanApi {
        let config = Config {
            api_url: url.to_string(),
            ..Config::default()
        };
        RestPlanApi::new(&config).unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = client("https://plans.example.com/api/");
        assert_eq!(
            api.url("meal-plans"),
            "https://plans.example.com/api/meal-plans"
        );
        assert_eq!(
            api.url("/pantry/consume"),
            "https://plans.example.com/api/pantry/consume"
        );
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert_eq!(format_date(date), "2024-06-05");
    }

    #[test]
    fn test_token_from_config() {
        let config = Config {
            api_token: Some("secret".to_string()),
            ..Config::default()
        };
        let api = RestPlanApi::new(&config).unwrap();
        assert_eq!(api.token.as_deref(), Some("secret"));
        assert!(client("http://localhost").token.is_none());
    }

    // --- Integration tests (need a running meal plan API) ---

    #[tokio::test]
    #[ignore = "needs a meal plan API on localhost:8080"]
    async fn test_fetch_range_against_local_api() {
        let api = RestPlanApi::new(&Config::default()).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 6, 18).unwrap();
        let days = api.fetch_day_range(from, to, "me").await.unwrap();
        assert!(days.iter().all(|d| d.date >= from && d.date <= to));
    }
}
