use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::vacancy_dto::{
        CreateVacancyPayload, UpdateVacancyPayload, UpsertVacanciesPayload,
        UpsertVacanciesResponse, VacancyListQuery, VacancyListResponse, VacancyResponse,
    },
    error::{Error, Result},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/vacancies",
    request_body = CreateVacancyPayload,
    responses(
        (status = 201, description = "Vacancy created successfully", body = Json<VacancyResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_vacancy(
    State(state): State<AppState>,
    Json(payload): Json<CreateVacancyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let vacancy = state.vacancy_service.create(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(VacancyResponse::from(vacancy))))
}

#[utoipa::path(
    patch,
    path = "/api/vacancies/{id}",
    params(
        ("id" = i64, Path, description = "Vacancy ID")
    ),
    request_body = UpdateVacancyPayload,
    responses(
        (status = 200, description = "Vacancy updated successfully", body = Json<VacancyResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn update_vacancy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateVacancyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let vacancy = state.vacancy_service.update(id, payload.into()).await?;
    Ok(Json(VacancyResponse::from(vacancy)))
}

#[utoipa::path(
    delete,
    path = "/api/vacancies/{id}",
    params(
        ("id" = i64, Path, description = "Vacancy ID")
    ),
    responses(
        (status = 204, description = "Vacancy deleted successfully"),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_vacancy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.vacancy_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/vacancies",
    params(
        ("timetable_mode_name" = Option<String>, Query, description = "Substring of the timetable mode"),
        ("city_name" = Option<String>, Query, description = "Substring of the city name")
    ),
    responses(
        (status = 200, description = "List of vacancies", body = Json<VacancyListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_vacancies(
    State(state): State<AppState>,
    Query(query): Query<VacancyListQuery>,
) -> Result<impl IntoResponse> {
    let items = state.vacancy_service.list(query.into()).await?;
    Ok(Json(VacancyListResponse::from(items)))
}

#[utoipa::path(
    get,
    path = "/api/vacancies/{id}",
    params(
        ("id" = i64, Path, description = "Vacancy ID")
    ),
    responses(
        (status = 200, description = "Vacancy found", body = Json<VacancyResponse>),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn get_vacancy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let vacancy = state.vacancy_service.get_by_id(id).await?;
    Ok(Json(VacancyResponse::from(vacancy)))
}

#[utoipa::path(
    get,
    path = "/api/vacancies/external/{external_id}",
    params(
        ("external_id" = i64, Path, description = "Vacancy ID in the external feed")
    ),
    responses(
        (status = 200, description = "Vacancy found", body = Json<VacancyResponse>),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn get_vacancy_by_external_id(
    State(state): State<AppState>,
    Path(external_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let vacancy = state
        .vacancy_service
        .get_by_external_id(external_id)
        .await?;
    Ok(Json(VacancyResponse::from(vacancy)))
}

#[utoipa::path(
    post,
    path = "/api/vacancies/upsert",
    request_body = UpsertVacanciesPayload,
    responses(
        (status = 200, description = "Batch stored", body = Json<UpsertVacanciesResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn upsert_vacancies(
    State(state): State<AppState>,
    Json(payload): Json<UpsertVacanciesPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.vacancy_service.upsert_batch(payload.items).await?;
    Ok(Json(UpsertVacanciesResponse { created }))
}

#[utoipa::path(
    post,
    path = "/api/vacancies/sync",
    responses(
        (status = 200, description = "Feed synchronized", body = Json<UpsertVacanciesResponse>),
        (status = 400, description = "No external feed configured"),
        (status = 502, description = "Feed unavailable")
    )
)]
#[axum::debug_handler]
pub async fn sync_vacancies(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let Some(feed) = state.feed_service.as_ref() else {
        return Err(Error::BadRequest(
            "External vacancy feed is not configured".to_string(),
        ));
    };
    let created = feed.sync(&state.vacancy_service).await?;
    Ok(Json(UpsertVacanciesResponse { created }))
}
