use {
    super::{errors::ApiError, orders::json_body},
    crate::{
        AppState,
        domain::id::{FridgeId, OrderId},
        services::unlock,
    },
    axum::{
        Json,
        extract::{Path, State, rejection::JsonRejection},
    },
    serde::Deserialize,
    serde_json::{Value, json},
};

/// Poll from the fridge controller. At most one caller receives a given
/// command.
#[tracing::instrument(skip_all, fields(fridge_id = %fridge_id))]
pub async fn claim(
    State(state): State<AppState>,
    Path(fridge_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let fridge_id = FridgeId::new(fridge_id)?;

    match unlock::claim_next(&state.pool, &fridge_id).await? {
        Some(command) => Ok(Json(json!({
            "unlock": true,
            "command_id": command.id,
            "order_id": command.order_id,
        }))),
        None => Ok(Json(json!({ "unlock": false }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct DoorOpenedBody {
    pub order_id: i64,
}

/// Always 200; unknown or unpaid orders are logged, not surfaced.
pub async fn door_opened(
    State(state): State<AppState>,
    payload: Result<Json<DoorOpenedBody>, JsonRejection>,
) -> Json<Value> {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(_) => {
            tracing::warn!("malformed door-open report");
            return Json(json!({ "confirmed": false }));
        }
    };

    let confirmed = match unlock::confirm_door_opened(&state.pool, OrderId::new(body.order_id)).await
    {
        Ok(c) => c.is_confirmed(),
        Err(e) => {
            tracing::error!(order_id = body.order_id, error = %e, "door-open confirmation failed");
            false
        }
    };

    Json(json!({ "confirmed": confirmed }))
}
