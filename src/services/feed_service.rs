use crate::error::Result;
use crate::models::vacancy::VacancyPatch;
use crate::services::vacancy_service::VacancyService;
use crate::utils::time::from_rfc3339;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Vacancy as published by the external job board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalVacancy {
    pub id: i64,
    pub title: String,
    pub company: Option<String>,
    pub city: Option<String>,
    pub timetable_mode: Option<String>,
    pub salary_from: Option<Decimal>,
    pub salary_to: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

impl From<ExternalVacancy> for VacancyPatch {
    fn from(value: ExternalVacancy) -> Self {
        let published_at = value.published_at.as_deref().and_then(|raw| {
            from_rfc3339(raw)
                .map_err(|e| {
                    warn!(external_id = value.id, raw, error = %e, "Ignoring unparseable publication date")
                })
                .ok()
        });

        Self {
            external_id: Some(Some(value.id)),
            title: Some(value.title),
            company_name: Some(value.company),
            city_name: Some(value.city),
            timetable_mode_name: Some(value.timetable_mode),
            salary_from: Some(value.salary_from),
            salary_to: Some(value.salary_to),
            currency: Some(value.currency),
            description: Some(value.description),
            requirements: Some(value.requirements),
            url: Some(value.url),
            published_at: Some(published_at),
        }
    }
}

#[derive(Clone)]
pub struct ExternalFeedService {
    client: Client,
    base_url: String,
}

impl ExternalFeedService {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_vacancies(&self) -> Result<Vec<ExternalVacancy>> {
        let url = format!("{}/api/vacancies", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;
        let vacancies = response.json::<Vec<ExternalVacancy>>().await?;
        Ok(vacancies)
    }

    /// Pulls the feed and stores it, returning how many vacancies were new.
    #[instrument(skip(self, vacancies), fields(base_url = %self.base_url))]
    pub async fn sync(&self, vacancies: &VacancyService) -> Result<u64> {
        let items = self.fetch_vacancies().await?;
        let fetched = items.len();
        let payloads: Vec<VacancyPatch> = items.into_iter().map(Into::into).collect();
        let created = vacancies.upsert_batch(payloads).await?;
        info!(fetched, created, "External vacancy feed synchronized");
        Ok(created)
    }
}
