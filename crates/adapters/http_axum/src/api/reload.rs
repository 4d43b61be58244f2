//! Reload handler.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use momentary_app::ports::{
    EventPublisher, IdentityRepository, LegacyConfigSource, ReversionScheduler, SwitchConfigStore,
};
use momentary_app::services::setup_service::SetupReport;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the reload endpoint.
pub enum ReloadResponse {
    Ok(Json<SetupReport>),
}

impl IntoResponse for ReloadResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `POST /api/reload`
pub async fn reload<C, I, L, S, P>(
    State(state): State<AppState<C, I, L, S, P>>,
) -> Result<ReloadResponse, ApiError>
where
    C: SwitchConfigStore + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    L: LegacyConfigSource + Send + Sync + 'static,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let report = state.setup_service.reload().await?;
    Ok(ReloadResponse::Ok(Json(report)))
}
