//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use checkout::CheckoutOutcome;
use domain::CheckoutRequest;
use store::Store;

use crate::AppState;
use crate::auth::AuthUser;
use crate::envelope::ApiResponse;
use crate::error::ApiError;

/// POST /cart/checkout: turn selected cart items into a transaction and orders.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<ApiResponse<CheckoutOutcome>, ApiError> {
    let Json(req) = payload?;
    let command = req.into_command()?;

    let outcome = state.checkout.checkout(user_id, command).await?;
    Ok(ApiResponse::created("Checkout successful", outcome))
}
