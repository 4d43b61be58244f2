//! JSON REST handlers for switches.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use momentary_app::ports::{
    EventPublisher, IdentityRepository, LegacyConfigSource, ReversionScheduler, SwitchConfigStore,
};
use momentary_domain::id::UniqueId;
use momentary_domain::momentary::SwitchSnapshot;
use momentary_domain::service::Service;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<SwitchSnapshot>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and call endpoints.
pub enum SwitchResponse {
    Ok(Json<SwitchSnapshot>),
}

impl IntoResponse for SwitchResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/switches`
pub async fn list<C, I, L, S, P>(
    State(state): State<AppState<C, I, L, S, P>>,
) -> ListResponse
where
    C: SwitchConfigStore + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    L: LegacyConfigSource + Send + Sync + 'static,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    ListResponse::Ok(Json(state.registry.list()))
}

/// `GET /api/switches/{unique_id}`
pub async fn get<C, I, L, S, P>(
    State(state): State<AppState<C, I, L, S, P>>,
    Path(unique_id): Path<String>,
) -> Result<SwitchResponse, ApiError>
where
    C: SwitchConfigStore + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    L: LegacyConfigSource + Send + Sync + 'static,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let unique_id: UniqueId = unique_id.parse()?;
    let entity = state.registry.get(&unique_id)?;
    Ok(SwitchResponse::Ok(Json(entity.snapshot())))
}

/// `POST /api/switches/{unique_id}/{service}`
pub async fn call<C, I, L, S, P>(
    State(state): State<AppState<C, I, L, S, P>>,
    Path((unique_id, service)): Path<(String, String)>,
) -> Result<SwitchResponse, ApiError>
where
    C: SwitchConfigStore + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    L: LegacyConfigSource + Send + Sync + 'static,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let unique_id: UniqueId = unique_id.parse()?;
    let service: Service = service.parse()?;
    tracing::debug!(%unique_id, %service, "service call");
    let snapshot = state.registry.call(&unique_id, service)?;
    Ok(SwitchResponse::Ok(Json(snapshot)))
}
