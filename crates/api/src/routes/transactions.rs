//! Transaction lookup endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use checkout::CheckoutOutcome;
use common::TransactionId;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::auth::AuthUser;
use crate::envelope::ApiResponse;
use crate::error::ApiError;

/// GET /transactions/{id}: one of the caller's transactions with its orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<CheckoutOutcome>, ApiError> {
    let transaction_id: TransactionId = parse_id("transaction id", &id)?;

    let outcome = state
        .checkout
        .get_transaction(user_id, transaction_id)
        .await?;
    Ok(ApiResponse::ok("Transaction retrieved", outcome))
}
