use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use imprint_order::{SubmitError, TransitionOutcome};
use imprint_shared::{Actor, OrderStatus};

use crate::error::{store_err, transition_err, AppError};
use crate::jobs;
use crate::state::AppState;

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let order = state
        .store
        .get_order(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| AppError::NotFoundError(format!("order {id} not found")))?;
    Ok(Json(json!(order)))
}

/// GET /v1/orders/{id}/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .store
        .get_order(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| AppError::NotFoundError(format!("order {id} not found")))?;
    let history = state.store.history(id).await.map_err(store_err)?;
    Ok(Json(json!(history)))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub admin_id: String,
    pub reason: Option<String>,
}

/// POST /v1/orders/{id}/transitions
/// Admin-initiated transition. Whatever is requested is recorded; a
/// non-adjacent target lands flagged irregular in the audit trail.
pub async fn request_transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .engine
        .transition(
            id,
            request.target,
            Actor::Admin(request.admin_id),
            request.reason,
        )
        .await
        .map_err(transition_err)?;

    let body = match outcome {
        TransitionOutcome::Applied { order, entry } => json!({
            "outcome": "applied",
            "order": order,
            "entry": entry,
        }),
        TransitionOutcome::NoOp { order } => json!({
            "outcome": "no_op",
            "order": order,
        }),
        TransitionOutcome::Stale { order } => json!({
            "outcome": "stale",
            "order": order,
        }),
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct PrintAssetRequest {
    pub url: String,
}

/// POST /v1/orders/{id}/items/{item_id}/print-asset
/// Attach the print-ready asset produced during design preparation.
pub async fn attach_print_asset(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<PrintAssetRequest>,
) -> Result<Json<Value>, AppError> {
    if request.url.trim().is_empty() {
        return Err(AppError::ValidationError(
            "print asset url must not be empty".into(),
        ));
    }
    let order = state
        .store
        .attach_print_asset(id, item_id, &request.url)
        .await
        .map_err(store_err)?;
    Ok(Json(json!(order)))
}

/// POST /v1/orders/{id}/submit
/// Submit a paid order to the fulfillment partner under the retry policy.
pub async fn submit_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    match jobs::submit_with_retry(&state, id).await {
        Ok(ack) => Ok(Json(json!({
            "partner_order_id": ack.partner_order_id,
            "partner_status": ack.partner_status,
        }))),
        Err(SubmitError::Store(e)) => Err(store_err(e)),
        Err(SubmitError::Rejected(rejection)) => {
            Err(AppError::ValidationError(rejection.to_string()))
        }
        Err(SubmitError::Provider(e)) => Err(AppError::ProviderError(e.to_string())),
        Err(SubmitError::Transition(e)) => Err(transition_err(e)),
    }
}
