//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::{BookId, CartItemId};
use domain::CartLine;
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::auth::AuthUser;
use crate::envelope::ApiResponse;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub book_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

/// GET /cart: the caller's cart items with their books.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
) -> Result<ApiResponse<Vec<CartLine>>, ApiError> {
    let lines = state.cart.list(user_id).await?;
    Ok(ApiResponse::ok("Cart retrieved", lines))
}

/// POST /cart/items: add a book to the cart.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<ApiResponse<CartLine>, ApiError> {
    let Json(req) = payload?;
    let book_id: BookId = parse_id("bookId", &req.book_id)?;

    let line = state.cart.add_item(user_id, book_id, req.quantity).await?;
    Ok(ApiResponse::created("Book added to cart", line))
}

/// PATCH /cart/items/{id}: change an item's quantity.
#[tracing::instrument(skip(state, payload))]
pub async fn update_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<ApiResponse<CartLine>, ApiError> {
    let Json(req) = payload?;
    let cart_item_id: CartItemId = parse_id("cart item id", &id)?;

    let line = state
        .cart
        .update_quantity(user_id, cart_item_id, req.quantity)
        .await?;
    Ok(ApiResponse::ok("Cart item updated", line))
}

/// DELETE /cart/items/{id}: remove an item from the cart.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let cart_item_id: CartItemId = parse_id("cart item id", &id)?;

    state.cart.remove_item(user_id, cart_item_id).await?;
    Ok(ApiResponse::ok("Cart item removed", ()))
}
