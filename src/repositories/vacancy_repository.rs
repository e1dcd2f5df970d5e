//! Data access for the `vacancies` table.
//!
//! A [`VacancyRepository`] borrows the caller's connection for as long as it
//! lives and keeps nothing else between calls. Every write opens a
//! transaction on that connection and commits before returning, so each call
//! is its own unit of work. When the connection is already inside a
//! transaction the nested `begin` becomes a savepoint.
//!
//! Updates only write the columns a [`VacancyPatch`] carries. Columns the
//! patch leaves out are never part of the statement, so concurrent writers
//! to other columns are not clobbered by a stale copy of the row.
//!
//! Nothing here serializes concurrent callers. Two batch upserts racing on
//! the same unseen `external_id` both decide to insert; the partial unique
//! index on `external_id` then rejects whichever commits second.

use std::collections::HashMap;

use sqlx::query_builder::Separated;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::vacancy::{NewVacancy, Vacancy, VacancyFilter, VacancyPatch, VACANCY_COLUMNS};

/// Rows per bulk statement. A bulk update row binds 25 parameters, which
/// keeps a chunk below the 65535 bind limit of the Postgres protocol.
const BULK_CHUNK_ROWS: usize = 1000;

const INSERT_COLUMNS: &str = "external_id, title, company_name, city_name, timetable_mode_name, \
     salary_from, salary_to, currency, description, requirements, url, published_at";

/// Writable columns, in the order [`update_many`] binds them.
const PATCH_COLUMNS: [&str; 12] = [
    "external_id",
    "title",
    "company_name",
    "city_name",
    "timetable_mode_name",
    "salary_from",
    "salary_to",
    "currency",
    "description",
    "requirements",
    "url",
    "published_at",
];

pub struct VacancyRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> VacancyRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Looks a vacancy up by primary key.
    pub async fn get(&mut self, id: i64) -> Result<Option<Vacancy>> {
        let query = format!("SELECT {VACANCY_COLUMNS} FROM vacancies WHERE id = $1");
        let vacancy = sqlx::query_as::<_, Vacancy>(&query)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(vacancy)
    }

    /// Looks a vacancy up by the id it carries in the external system.
    pub async fn get_by_external_id(&mut self, external_id: i64) -> Result<Option<Vacancy>> {
        let query = format!("SELECT {VACANCY_COLUMNS} FROM vacancies WHERE external_id = $1");
        let vacancy = sqlx::query_as::<_, Vacancy>(&query)
            .bind(external_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(vacancy)
    }

    /// Lists vacancies matching every provided filter, newest first.
    ///
    /// Filters are case-insensitive literal substrings. Postgres sorts
    /// `NULL` before any value under `DESC`, so rows without `published_at`
    /// come first.
    pub async fn list(&mut self, filter: &VacancyFilter) -> Result<Vec<Vacancy>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {VACANCY_COLUMNS} FROM vacancies WHERE TRUE"
        ));

        if let Some(timetable_mode_name) = filter.timetable_mode_name() {
            builder
                .push(" AND timetable_mode_name ILIKE ")
                .push_bind(contains_pattern(timetable_mode_name));
        }
        if let Some(city_name) = filter.city_name() {
            builder
                .push(" AND city_name ILIKE ")
                .push_bind(contains_pattern(city_name));
        }
        builder.push(" ORDER BY published_at DESC");

        let items = builder
            .build_query_as::<Vacancy>()
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(items)
    }

    /// Inserts a vacancy and returns it with the store-assigned columns.
    pub async fn create(&mut self, data: NewVacancy) -> Result<Vacancy> {
        let mut tx = self.conn.begin().await?;

        let query = format!(
            "INSERT INTO vacancies ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {VACANCY_COLUMNS}"
        );
        let vacancy = sqlx::query_as::<_, Vacancy>(&query)
            .bind(data.external_id)
            .bind(data.title)
            .bind(data.company_name)
            .bind(data.city_name)
            .bind(data.timetable_mode_name)
            .bind(data.salary_from)
            .bind(data.salary_to)
            .bind(data.currency)
            .bind(data.description)
            .bind(data.requirements)
            .bind(data.url)
            .bind(data.published_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(vacancy)
    }

    /// Writes the fields present in `data` onto the stored row of `existing`
    /// and returns the row as stored afterwards. Columns the patch leaves out
    /// keep whatever value the store holds.
    pub async fn update(&mut self, existing: Vacancy, data: VacancyPatch) -> Result<Vacancy> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE vacancies SET ");
        {
            let mut assignments = builder.separated(", ");
            push_assignments(&mut assignments, data);
            assignments.push("updated_at = NOW()");
        }
        builder
            .push(" WHERE id = ")
            .push_bind(existing.id)
            .push(format!(" RETURNING {VACANCY_COLUMNS}"));

        let mut tx = self.conn.begin().await?;
        let vacancy = builder
            .build_query_as::<Vacancy>()
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(vacancy)
    }

    /// Removes the stored row of `existing`.
    pub async fn delete(&mut self, existing: Vacancy) -> Result<()> {
        let mut tx = self.conn.begin().await?;
        sqlx::query("DELETE FROM vacancies WHERE id = $1")
            .bind(existing.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Updates vacancies whose `external_id` is already stored and inserts
    /// the rest, all in one transaction. Returns how many rows were inserted.
    ///
    /// Existing rows are looked up once, before any payload is processed.
    /// Payloads without a usable external id are always inserted, and two
    /// payloads sharing an unseen external id are both inserted, which the
    /// unique index rejects. Nothing is written unless the whole batch
    /// succeeds.
    pub async fn upsert_batch(&mut self, payloads: Vec<VacancyPatch>) -> Result<u64> {
        let lookup: Vec<i64> = payloads
            .iter()
            .filter_map(VacancyPatch::usable_external_id)
            .collect();

        let mut tx = self.conn.begin().await?;

        let existing: HashMap<i64, i64> = if lookup.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, (i64, Option<i64>)>(
                "SELECT id, external_id FROM vacancies WHERE external_id = ANY($1)",
            )
            .bind(&lookup)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .filter_map(|(id, external_id)| external_id.map(|key| (key, id)))
            .collect()
        };

        let (inserts, updates) = partition_payloads(payloads, &existing)?;

        let mut created = 0;
        for chunk in inserts.chunks(BULK_CHUNK_ROWS) {
            created += insert_many(&mut tx, chunk).await?;
        }
        for chunk in updates.chunks(BULK_CHUNK_ROWS) {
            update_many(&mut tx, chunk).await?;
        }

        tx.commit().await?;

        debug!(created, updated = updates.len(), "vacancy batch upserted");
        Ok(created)
    }
}

/// Splits payloads into rows to insert and patches for stored rows, keyed by
/// row id. Several payloads for the same row are merged in input order; rows
/// keep the order in which they were first matched.
fn partition_payloads(
    payloads: Vec<VacancyPatch>,
    existing: &HashMap<i64, i64>,
) -> Result<(Vec<NewVacancy>, Vec<(i64, VacancyPatch)>)> {
    let mut inserts = Vec::new();
    let mut updates: Vec<(i64, VacancyPatch)> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for payload in payloads {
        let key = payload.usable_external_id();
        match key.and_then(|key| existing.get(&key).copied()) {
            Some(id) => match positions.get(&id) {
                Some(&at) => {
                    let (_, earlier) = &mut updates[at];
                    *earlier = std::mem::take(earlier).merge(payload);
                }
                None => {
                    positions.insert(id, updates.len());
                    updates.push((id, payload));
                }
            },
            None => {
                let new = payload.into_new_vacancy().ok_or_else(|| {
                    Error::BadRequest(format!(
                        "vacancy payload with external_id {:?} has no title",
                        key
                    ))
                })?;
                inserts.push(new);
            }
        }
    }

    Ok((inserts, updates))
}

/// Appends `column = $n` for every field present in `patch`.
fn push_assignments(
    assignments: &mut Separated<'_, '_, Postgres, &'static str>,
    patch: VacancyPatch,
) {
    macro_rules! assign {
        ($($field:ident),+ $(,)?) => {
            $(
                if let Some(value) = patch.$field {
                    assignments
                        .push(concat!(stringify!($field), " = "))
                        .push_bind_unseparated(value);
                }
            )+
        };
    }

    assign!(
        external_id,
        title,
        company_name,
        city_name,
        timetable_mode_name,
        salary_from,
        salary_to,
        currency,
        description,
        requirements,
        url,
        published_at,
    );
}

async fn insert_many(conn: &mut PgConnection, rows: &[NewVacancy]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut builder =
        QueryBuilder::<Postgres>::new(format!("INSERT INTO vacancies ({INSERT_COLUMNS}) "));
    builder.push_values(rows, |mut row, vacancy| {
        row.push_bind(vacancy.external_id)
            .push_bind(&vacancy.title)
            .push_bind(&vacancy.company_name)
            .push_bind(&vacancy.city_name)
            .push_bind(&vacancy.timetable_mode_name)
            .push_bind(vacancy.salary_from)
            .push_bind(vacancy.salary_to)
            .push_bind(&vacancy.currency)
            .push_bind(&vacancy.description)
            .push_bind(&vacancy.requirements)
            .push_bind(&vacancy.url)
            .push_bind(vacancy.published_at);
    });

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Bulk form of [`push_assignments`]: every column travels with a `set_*`
/// flag, and columns whose flag is false keep the stored value.
async fn update_many(conn: &mut PgConnection, rows: &[(i64, VacancyPatch)]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let assignments = PATCH_COLUMNS
        .iter()
        .map(|c| format!("{c} = CASE WHEN u.set_{c} THEN u.{c} ELSE v.{c} END"))
        .collect::<Vec<_>>()
        .join(", ");
    let aliases = PATCH_COLUMNS
        .iter()
        .map(|c| format!("set_{c}, {c}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "UPDATE vacancies AS v SET {assignments}, updated_at = NOW() FROM ("
    ));
    builder.push_values(rows, |mut row, (id, patch)| {
        row.push_bind(*id)
            .push_bind(patch.external_id.is_some())
            .push_bind(flatten_ref(&patch.external_id))
            .push_bind(patch.title.is_some())
            .push_bind(patch.title.as_ref())
            .push_bind(patch.company_name.is_some())
            .push_bind(flatten_ref(&patch.company_name))
            .push_bind(patch.city_name.is_some())
            .push_bind(flatten_ref(&patch.city_name))
            .push_bind(patch.timetable_mode_name.is_some())
            .push_bind(flatten_ref(&patch.timetable_mode_name))
            .push_bind(patch.salary_from.is_some())
            .push_bind(flatten_ref(&patch.salary_from))
            .push_bind(patch.salary_to.is_some())
            .push_bind(flatten_ref(&patch.salary_to))
            .push_bind(patch.currency.is_some())
            .push_bind(flatten_ref(&patch.currency))
            .push_bind(patch.description.is_some())
            .push_bind(flatten_ref(&patch.description))
            .push_bind(patch.requirements.is_some())
            .push_bind(flatten_ref(&patch.requirements))
            .push_bind(patch.url.is_some())
            .push_bind(flatten_ref(&patch.url))
            .push_bind(patch.published_at.is_some())
            .push_bind(flatten_ref(&patch.published_at));
    });
    builder.push(format!(") AS u(id, {aliases}) WHERE v.id = u.id"));

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

fn flatten_ref<T>(value: &Option<Option<T>>) -> Option<&T> {
    value.as_ref().and_then(Option::as_ref)
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in the needle
/// escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(external_id: Option<i64>, title: Option<&str>) -> VacancyPatch {
        VacancyPatch {
            external_id: Some(external_id),
            title: title.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn contains_pattern_wraps_and_escapes() {
        assert_eq!(contains_pattern("Mos"), "%Mos%");
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn partition_splits_matches_from_new_rows() {
        let existing = HashMap::from([(2, 20)]);
        let payloads = vec![
            patch(Some(1), Some("New one")),
            patch(Some(2), Some("Renamed")),
            patch(None, Some("No external id")),
        ];

        let (inserts, updates) = partition_payloads(payloads, &existing).unwrap();

        assert_eq!(inserts.len(), 2);
        assert_eq!(inserts[0].external_id, Some(1));
        assert_eq!(inserts[1].external_id, None);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, 20);
        assert_eq!(updates[0].1.title.as_deref(), Some("Renamed"));
        assert_eq!(updates[0].1.city_name, None);
    }

    #[test]
    fn repeated_matches_merge_in_order() {
        let existing = HashMap::from([(2, 20)]);
        let mut second = patch(Some(2), None);
        second.city_name = Some(Some("Kazan".into()));
        let mut third = patch(Some(2), Some("Third"));
        third.city_name = None;
        let payloads = vec![patch(Some(2), Some("First")), second, third];

        let (inserts, updates) = partition_payloads(payloads, &existing).unwrap();

        assert!(inserts.is_empty());
        assert_eq!(updates.len(), 1);
        let (id, merged) = &updates[0];
        assert_eq!(*id, 20);
        assert_eq!(merged.title.as_deref(), Some("Third"));
        assert_eq!(merged.city_name, Some(Some("Kazan".to_string())));
        assert_eq!(merged.description, None);
    }

    #[test]
    fn zero_external_id_is_never_matched() {
        let existing = HashMap::from([(0, 20)]);
        let (inserts, updates) =
            partition_payloads(vec![patch(Some(0), Some("Zero"))], &existing).unwrap();

        assert_eq!(inserts.len(), 1);
        assert!(updates.is_empty());
    }

    #[test]
    fn untitled_new_row_fails_the_batch() {
        let existing = HashMap::new();
        let err = partition_payloads(vec![patch(Some(9), None)], &existing).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn update_sets_only_present_columns() {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE vacancies SET ");
        {
            let mut assignments = builder.separated(", ");
            push_assignments(
                &mut assignments,
                VacancyPatch {
                    title: Some("B".into()),
                    description: Some(None),
                    ..Default::default()
                },
            );
            assignments.push("updated_at = NOW()");
        }

        assert_eq!(
            builder.sql(),
            "UPDATE vacancies SET title = $1, description = $2, updated_at = NOW()"
        );
    }

    #[test]
    fn empty_patch_only_touches_updated_at() {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE vacancies SET ");
        {
            let mut assignments = builder.separated(", ");
            push_assignments(&mut assignments, VacancyPatch::default());
            assignments.push("updated_at = NOW()");
        }

        assert_eq!(builder.sql(), "UPDATE vacancies SET updated_at = NOW()");
    }
}
