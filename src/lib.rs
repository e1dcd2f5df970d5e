pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{feed_service::ExternalFeedService, vacancy_service::VacancyService};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub vacancy_service: VacancyService,
    pub feed_service: Option<ExternalFeedService>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let vacancy_service = VacancyService::new(pool.clone());

        Self {
            pool,
            vacancy_service,
            feed_service: None,
        }
    }

    pub fn with_feed(mut self, feed_service: ExternalFeedService) -> Self {
        self.feed_service = Some(feed_service);
        self
    }
}
