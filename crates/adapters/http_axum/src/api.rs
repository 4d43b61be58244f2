//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod reload;
#[allow(clippy::missing_errors_doc)]
pub mod switches;

use axum::Router;
use axum::routing::{get, post};

use momentary_app::ports::{
    EventPublisher, IdentityRepository, LegacyConfigSource, ReversionScheduler, SwitchConfigStore,
};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<C, I, L, S, P>() -> Router<AppState<C, I, L, S, P>>
where
    C: SwitchConfigStore + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    L: LegacyConfigSource + Send + Sync + 'static,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Router::new()
        .route("/switches", get(switches::list::<C, I, L, S, P>))
        .route("/switches/{unique_id}", get(switches::get::<C, I, L, S, P>))
        .route(
            "/switches/{unique_id}/{service}",
            post(switches::call::<C, I, L, S, P>),
        )
        .route("/reload", post(reload::reload::<C, I, L, S, P>))
}
