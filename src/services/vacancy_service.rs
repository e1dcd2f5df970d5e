use crate::error::{Error, Result};
use crate::models::vacancy::{NewVacancy, Vacancy, VacancyFilter, VacancyPatch};
use crate::repositories::vacancy_repository::VacancyRepository;
use sqlx::PgPool;
use tracing::{info, instrument};

/// Pool-backed entry point used by the HTTP layer and the feed worker.
///
/// Each call checks out one connection and runs a single repository
/// operation on it.
#[derive(Clone)]
pub struct VacancyService {
    pool: PgPool,
}

impl VacancyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find(&self, id: i64) -> Result<Option<Vacancy>> {
        let mut conn = self.pool.acquire().await?;
        VacancyRepository::new(&mut conn).get(id).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Vacancy>> {
        let mut conn = self.pool.acquire().await?;
        VacancyRepository::new(&mut conn)
            .get_by_external_id(external_id)
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Vacancy> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Vacancy {} not found", id)))
    }

    pub async fn get_by_external_id(&self, external_id: i64) -> Result<Vacancy> {
        self.find_by_external_id(external_id).await?.ok_or_else(|| {
            Error::NotFound(format!("Vacancy with external id {} not found", external_id))
        })
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: VacancyFilter) -> Result<Vec<Vacancy>> {
        let mut conn = self.pool.acquire().await?;
        VacancyRepository::new(&mut conn).list(&filter).await
    }

    #[instrument(skip(self, data), fields(external_id = ?data.external_id))]
    pub async fn create(&self, data: NewVacancy) -> Result<Vacancy> {
        let mut conn = self.pool.acquire().await?;
        let vacancy = VacancyRepository::new(&mut conn).create(data).await?;
        info!(id = vacancy.id, "vacancy created");
        Ok(vacancy)
    }

    #[instrument(skip(self, data))]
    pub async fn update(&self, id: i64, data: VacancyPatch) -> Result<Vacancy> {
        let mut conn = self.pool.acquire().await?;
        let mut repo = VacancyRepository::new(&mut conn);
        let existing = repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Vacancy {} not found", id)))?;
        repo.update(existing, data).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let mut repo = VacancyRepository::new(&mut conn);
        let existing = repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Vacancy {} not found", id)))?;
        repo.delete(existing).await?;
        info!(id, "vacancy deleted");
        Ok(())
    }

    #[instrument(skip(self, payloads), fields(batch = payloads.len()))]
    pub async fn upsert_batch(&self, payloads: Vec<VacancyPatch>) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let created = VacancyRepository::new(&mut conn)
            .upsert_batch(payloads)
            .await?;
        info!(created, "vacancy batch stored");
        Ok(created)
    }
}
