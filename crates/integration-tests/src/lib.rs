//! Integration test support for Basket.
//!
//! [`MockCartApi`] serves the REST cart API from memory on an ephemeral
//! local port, so the HTTP client and the engine can be exercised over real
//! HTTP without a backend.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p basket-integration-tests
//! ```
//!
//! # Behavior
//!
//! - Every request must carry `Authorization: Bearer <token>`, else 401
//! - `GET /cart` answers 404 until the first write (or after [`MockCartApi::set_no_cart`])
//! - Unknown products are 404 `{"message":"Product not found"}`
//! - Quantities above a product's stock are 400
//!   `{"message":"Insufficient stock for product N"}`
//! - Any route can be made to fail with [`MockCartApi::fail_route`]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use basket_core::{Cart, CartItem, CartLineInput, Product, ProductId};
use basket_storefront::remote::{RemoteCart, SyncRequest};
use serde_json::json;
use tokio::task::JoinHandle;

/// Route keys accepted by [`MockCartApi::fail_route`].
pub mod routes {
    pub const FETCH: &str = "GET /cart";
    pub const ADD: &str = "POST /cart";
    pub const SET_QUANTITY: &str = "PUT /cart/items";
    pub const REMOVE: &str = "DELETE /cart/{id}";
    pub const CLEAR: &str = "DELETE /cart";
    pub const SYNC: &str = "POST /cart/sync";
}

/// One request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Route key, e.g. `POST /cart`.
    pub route: &'static str,
    /// `Authorization` header, if sent.
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    token: String,
    catalog: HashMap<ProductId, Product>,
    items: Vec<CartItem>,
    has_cart: bool,
    failures: HashMap<&'static str, (StatusCode, String)>,
    requests: Vec<RecordedRequest>,
    sync_bodies: Vec<SyncRequest>,
}

type SharedState = Arc<Mutex<MockState>>;

/// In-memory cart API server.
pub struct MockCartApi {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl MockCartApi {
    /// Bind to an ephemeral port and start serving. Requests must carry
    /// `Bearer {token}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(token: &str) -> std::io::Result<Self> {
        let state: SharedState = Arc::new(Mutex::new(MockState {
            token: token.to_string(),
            ..MockState::default()
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(Arc::clone(&state));

        // Runs until the mock is dropped
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// API base URL to hand to `CartApiConfig::new`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Register a catalog product.
    pub fn add_product(&self, product: Product) {
        self.state().catalog.insert(product.id, product);
    }

    /// Replace the server cart.
    pub fn seed(&self, items: Vec<CartItem>) {
        let mut state = self.state();
        state.items = Cart::from_items(items).into_items();
        state.has_cart = true;
    }

    /// Make `GET /cart` answer 404 again.
    pub fn set_no_cart(&self) {
        let mut state = self.state();
        state.items.clear();
        state.has_cart = false;
    }

    /// Current server cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        Cart::from_items(self.state().items.clone())
    }

    /// Answer every request to `route` with `status` and `body`.
    pub fn fail_route(&self, route: &'static str, status: StatusCode, body: &str) {
        self.state()
            .failures
            .insert(route, (status, body.to_string()));
    }

    /// Stop failing `route`.
    pub fn recover_route(&self, route: &'static str) {
        self.state().failures.remove(route);
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    /// Bodies of successful `POST /cart/sync` calls.
    #[must_use]
    pub fn sync_bodies(&self) -> Vec<SyncRequest> {
        self.state().sync_bodies.clone()
    }
}

impl Drop for MockCartApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/cart", get(fetch).post(add).delete(clear))
        .route("/api/cart/items", put(set_quantity))
        .route("/api/cart/sync", post(sync))
        .route("/api/cart/{id}", delete(remove))
        .with_state(state)
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

/// Record the request, then enforce auth and injected failures.
fn begin(state: &mut MockState, route: &'static str, headers: &HeaderMap) -> Result<(), Response> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.push(RecordedRequest {
        route,
        authorization: authorization.clone(),
    });

    if authorization.as_deref() != Some(format!("Bearer {}", state.token).as_str()) {
        return Err(message(StatusCode::UNAUTHORIZED, "User not logged in"));
    }

    if let Some((status, body)) = state.failures.get(route) {
        let mut response = (*status, body.clone()).into_response();
        if *status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("3"));
        }
        return Err(response);
    }
    Ok(())
}

/// Upsert or set a line, enforcing the catalog and stock.
fn apply(state: &mut MockState, line: CartLineInput, additive: bool) -> Result<(), Response> {
    let Some(product) = state.catalog.get(&line.product_id).cloned() else {
        return Err(message(StatusCode::NOT_FOUND, "Product not found"));
    };

    let cart = Cart::from_items(std::mem::take(&mut state.items));
    let target = if additive {
        cart.quantity_of(product.id).saturating_add(line.quantity)
    } else {
        line.quantity
    };

    if product.stock_quantity.is_some_and(|stock| target > stock) {
        state.items = cart.into_items();
        return Err(message(
            StatusCode::BAD_REQUEST,
            &format!("Insufficient stock for product {}", product.id),
        ));
    }

    let updated = if cart.line(product.id).is_some() {
        cart.with_quantity(product.id, target)
    } else {
        cart.with_added(&product, target)
    };
    state.items = updated.into_items();
    state.has_cart = true;
    Ok(())
}

async fn fetch(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    if let Err(response) = begin(&mut state, routes::FETCH, &headers) {
        return response;
    }
    if !state.has_cart {
        return message(StatusCode::NOT_FOUND, "Cart not found");
    }

    let cart = Cart::from_items(state.items.clone());
    Json(RemoteCart::from(&cart)).into_response()
}

async fn add(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(line): Json<CartLineInput>,
) -> Response {
    let mut state = lock(&state);
    begin(&mut state, routes::ADD, &headers)
        .and_then(|()| apply(&mut state, line, true))
        .map_or_else(|response| response, |()| StatusCode::OK.into_response())
}

async fn set_quantity(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(line): Json<CartLineInput>,
) -> Response {
    let mut state = lock(&state);
    begin(&mut state, routes::SET_QUANTITY, &headers)
        .and_then(|()| apply(&mut state, line, false))
        .map_or_else(|response| response, |()| StatusCode::OK.into_response())
}

async fn remove(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = begin(&mut state, routes::REMOVE, &headers) {
        return response;
    }

    let product_id = ProductId::new(id);
    if !state.items.iter().any(|i| i.product_id == product_id) {
        return message(StatusCode::NOT_FOUND, "Item not found in cart");
    }
    state.items.retain(|i| i.product_id != product_id);
    StatusCode::NO_CONTENT.into_response()
}

async fn clear(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    if let Err(response) = begin(&mut state, routes::CLEAR, &headers) {
        return response;
    }
    state.items.clear();
    StatusCode::NO_CONTENT.into_response()
}

async fn sync(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<SyncRequest>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = begin(&mut state, routes::SYNC, &headers) {
        return response;
    }

    for line in &body.items {
        if let Err(response) = apply(&mut state, *line, true) {
            return response;
        }
    }
    state.sync_bodies.push(body);
    StatusCode::OK.into_response()
}
