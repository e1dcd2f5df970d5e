use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::vacancy::{deserialize_present, NewVacancy, Vacancy, VacancyFilter, VacancyPatch};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVacancyPayload {
    pub external_id: Option<i64>,
    #[validate(length(min = 1))]
    pub title: String,
    pub company_name: Option<String>,
    pub city_name: Option<String>,
    pub timetable_mode_name: Option<String>,
    pub salary_from: Option<Decimal>,
    pub salary_to: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    #[validate(url)]
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Only the keys present in the request body are written; `null` clears a
/// nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateVacancyPayload {
    #[serde(default, deserialize_with = "deserialize_present")]
    pub external_id: Option<Option<i64>>,
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub company_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub city_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub timetable_mode_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub salary_from: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub salary_to: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub currency: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub requirements: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub published_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertVacanciesPayload {
    #[validate(length(max = 5000))]
    pub items: Vec<VacancyPatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertVacanciesResponse {
    pub created: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyResponse {
    pub id: i64,
    pub external_id: Option<i64>,
    pub title: String,
    pub company_name: Option<String>,
    pub city_name: Option<String>,
    pub timetable_mode_name: Option<String>,
    pub salary_from: Option<Decimal>,
    pub salary_to: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyListResponse {
    pub items: Vec<VacancyResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VacancyListQuery {
    pub timetable_mode_name: Option<String>,
    pub city_name: Option<String>,
}

impl From<CreateVacancyPayload> for NewVacancy {
    fn from(value: CreateVacancyPayload) -> Self {
        Self {
            external_id: value.external_id,
            title: value.title,
            company_name: value.company_name,
            city_name: value.city_name,
            timetable_mode_name: value.timetable_mode_name,
            salary_from: value.salary_from,
            salary_to: value.salary_to,
            currency: value.currency,
            description: value.description,
            requirements: value.requirements,
            url: value.url,
            published_at: value.published_at,
        }
    }
}

impl From<UpdateVacancyPayload> for VacancyPatch {
    fn from(value: UpdateVacancyPayload) -> Self {
        Self {
            external_id: value.external_id,
            title: value.title,
            company_name: value.company_name,
            city_name: value.city_name,
            timetable_mode_name: value.timetable_mode_name,
            salary_from: value.salary_from,
            salary_to: value.salary_to,
            currency: value.currency,
            description: value.description,
            requirements: value.requirements,
            url: value.url,
            published_at: value.published_at,
        }
    }
}

impl From<VacancyListQuery> for VacancyFilter {
    fn from(value: VacancyListQuery) -> Self {
        Self {
            timetable_mode_name: value.timetable_mode_name,
            city_name: value.city_name,
        }
    }
}

impl From<Vacancy> for VacancyResponse {
    fn from(value: Vacancy) -> Self {
        Self {
            id: value.id,
            external_id: value.external_id,
            title: value.title,
            company_name: value.company_name,
            city_name: value.city_name,
            timetable_mode_name: value.timetable_mode_name,
            salary_from: value.salary_from,
            salary_to: value.salary_to,
            currency: value.currency,
            description: value.description,
            requirements: value.requirements,
            url: value.url,
            published_at: value.published_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Vec<Vacancy>> for VacancyListResponse {
    fn from(value: Vec<Vacancy>) -> Self {
        let items: Vec<VacancyResponse> = value.into_iter().map(Into::into).collect();
        Self {
            total: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_payload_requires_a_title() {
        let payload: CreateVacancyPayload =
            serde_json::from_value(json!({ "title": "", "city_name": "Moscow" })).unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn create_payload_checks_url_and_currency() {
        let payload: CreateVacancyPayload = serde_json::from_value(json!({
            "title": "Analyst",
            "currency": "RUB",
            "url": "https://jobs.example.com/analyst"
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let payload: CreateVacancyPayload = serde_json::from_value(json!({
            "title": "Analyst",
            "url": "not a url"
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn update_payload_keeps_absent_and_null_apart() {
        let payload: UpdateVacancyPayload =
            serde_json::from_value(json!({ "city_name": null, "title": "Lead" })).unwrap();
        assert!(payload.validate().is_ok());

        let patch = VacancyPatch::from(payload);
        assert_eq!(patch.city_name, Some(None));
        assert_eq!(patch.title.as_deref(), Some("Lead"));
        assert_eq!(patch.company_name, None);
    }

    #[test]
    fn update_payload_rejects_blank_title_and_unknown_keys() {
        let payload: UpdateVacancyPayload =
            serde_json::from_value(json!({ "title": "" })).unwrap();
        assert!(payload.validate().is_err());

        assert!(serde_json::from_value::<UpdateVacancyPayload>(json!({ "salary": 1 })).is_err());
    }
}
