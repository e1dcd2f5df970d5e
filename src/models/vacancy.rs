use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Column list shared by every query that materializes a [`Vacancy`].
pub const VACANCY_COLUMNS: &str = "id, external_id, title, company_name, city_name, \
     timetable_mode_name, salary_from, salary_to, currency, description, requirements, url, \
     published_at, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Vacancy {
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

/// Everything needed to insert a row; store-assigned columns are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewVacancy {
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
}

/// Partial set of writable vacancy fields.
///
/// A field left as `None` is not part of the write and keeps its stored value. Nullable
/// columns are doubly wrapped so a payload can distinguish "leave alone"
/// (`None`) from "clear" (`Some(None)`). Keys outside this list are rejected
/// during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VacancyPatch {
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub company_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub city_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub timetable_mode_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub salary_from: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub salary_to: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub currency: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Option<DateTime<Utc>>>,
}

/// Marks a key that appeared in the payload, even when its value is `null`.
pub fn deserialize_present<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl VacancyPatch {
    /// External id usable for matching against stored rows.
    ///
    /// Missing, null and zero ids are never matched; such payloads always
    /// produce a new row.
    pub fn usable_external_id(&self) -> Option<i64> {
        self.external_id.flatten().filter(|id| *id != 0)
    }

    /// Combines two patches for the same row. Fields present in `later` win;
    /// the rest come from `self`.
    pub fn merge(self, later: VacancyPatch) -> VacancyPatch {
        VacancyPatch {
            external_id: later.external_id.or(self.external_id),
            title: later.title.or(self.title),
            company_name: later.company_name.or(self.company_name),
            city_name: later.city_name.or(self.city_name),
            timetable_mode_name: later.timetable_mode_name.or(self.timetable_mode_name),
            salary_from: later.salary_from.or(self.salary_from),
            salary_to: later.salary_to.or(self.salary_to),
            currency: later.currency.or(self.currency),
            description: later.description.or(self.description),
            requirements: later.requirements.or(self.requirements),
            url: later.url.or(self.url),
            published_at: later.published_at.or(self.published_at),
        }
    }

    /// Turns the patch into an insert payload. Returns `None` when the patch
    /// carries no title, since a row cannot exist without one.
    pub fn into_new_vacancy(self) -> Option<NewVacancy> {
        Some(NewVacancy {
            title: self.title?,
            external_id: self.external_id.flatten(),
            company_name: self.company_name.flatten(),
            city_name: self.city_name.flatten(),
            timetable_mode_name: self.timetable_mode_name.flatten(),
            salary_from: self.salary_from.flatten(),
            salary_to: self.salary_to.flatten(),
            currency: self.currency.flatten(),
            description: self.description.flatten(),
            requirements: self.requirements.flatten(),
            url: self.url.flatten(),
            published_at: self.published_at.flatten(),
        })
    }
}

/// Optional substring filters for listing; empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VacancyFilter {
    pub timetable_mode_name: Option<String>,
    pub city_name: Option<String>,
}

impl VacancyFilter {
    pub fn timetable_mode_name(&self) -> Option<&str> {
        non_empty(self.timetable_mode_name.as_deref())
    }

    pub fn city_name(&self) -> Option<&str> {
        non_empty(self.city_name.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_prefers_later_present_fields() {
        let earlier: VacancyPatch = serde_json::from_value(
            json!({ "title": "Staff engineer", "city_name": "Kazan", "currency": "RUB" }),
        )
        .unwrap();
        let later: VacancyPatch =
            serde_json::from_value(json!({ "city_name": "Tula", "description": null })).unwrap();

        let merged = earlier.merge(later);

        assert_eq!(merged.title.as_deref(), Some("Staff engineer"));
        assert_eq!(merged.city_name, Some(Some("Tula".to_string())));
        assert_eq!(merged.currency, Some(Some("RUB".to_string())));
        assert_eq!(merged.description, Some(None));
        assert_eq!(merged.company_name, None);
    }

    #[test]
    fn explicit_null_is_kept_apart_from_absence() {
        let patch: VacancyPatch =
            serde_json::from_value(json!({ "description": null })).unwrap();

        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.currency, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_value::<VacancyPatch>(json!({ "id": 1, "title": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn usable_external_id_skips_missing_null_and_zero() {
        let missing = VacancyPatch::default();
        let null = VacancyPatch {
            external_id: Some(None),
            ..Default::default()
        };
        let zero = VacancyPatch {
            external_id: Some(Some(0)),
            ..Default::default()
        };
        let real = VacancyPatch {
            external_id: Some(Some(15)),
            ..Default::default()
        };

        assert_eq!(missing.usable_external_id(), None);
        assert_eq!(null.usable_external_id(), None);
        assert_eq!(zero.usable_external_id(), None);
        assert_eq!(real.usable_external_id(), Some(15));
    }

    #[test]
    fn into_new_vacancy_requires_title() {
        let untitled = VacancyPatch {
            external_id: Some(Some(3)),
            ..Default::default()
        };
        assert!(untitled.into_new_vacancy().is_none());

        let titled = VacancyPatch {
            external_id: Some(Some(3)),
            title: Some("Courier".into()),
            city_name: Some(None),
            ..Default::default()
        };
        let new = titled.into_new_vacancy().unwrap();
        assert_eq!(new.title, "Courier");
        assert_eq!(new.external_id, Some(3));
        assert_eq!(new.city_name, None);
    }

    #[test]
    fn empty_filters_count_as_unset() {
        let filter = VacancyFilter {
            timetable_mode_name: Some(String::new()),
            city_name: Some("Mos".into()),
        };
        assert_eq!(filter.timetable_mode_name(), None);
        assert_eq!(filter.city_name(), Some("Mos"));
    }
}
