pub mod feed_service;
pub mod vacancy_service;
