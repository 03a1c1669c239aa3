//! Cart engine end to end: file-backed guest cart, HTTP server cart.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use basket_core::{CartItem, Product, ProductId};
use basket_integration_tests::{MockCartApi, routes};
use basket_storefront::guest::{GUEST_CART_KEY, LocalStorage};
use basket_storefront::{
    AuthSession, CartApiConfig, CartEngine, FileStorage, GuestStore, HttpCartClient, Notice,
    SessionState,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tempfile::TempDir;

const TOKEN: &str = "test-token";

fn tea() -> Product {
    Product::new(ProductId::new(1), "Sencha", Decimal::from(10))
}

fn mug() -> Product {
    Product::new(ProductId::new(2), "Mug", Decimal::from(20)).with_stock(3)
}

struct Shop {
    mock: MockCartApi,
    dir: TempDir,
    auth: AuthSession,
    engine: CartEngine<HttpCartClient>,
}

async fn open_shop() -> Shop {
    let mock = MockCartApi::start(TOKEN).await.unwrap();
    mock.add_product(tea());
    mock.add_product(mug());

    let dir = tempfile::tempdir().unwrap();
    let auth = AuthSession::new();
    let client = HttpCartClient::new(
        CartApiConfig::new(&mock.base_url()).unwrap(),
        auth.token(),
    )
    .unwrap();
    let engine = CartEngine::new(GuestStore::new(FileStorage::new(dir.path())), client);

    Shop {
        mock,
        dir,
        auth,
        engine,
    }
}

impl Shop {
    fn stored_guest_cart(&self) -> Option<String> {
        FileStorage::new(self.dir.path())
            .get(GUEST_CART_KEY)
            .unwrap()
    }

    async fn sign_in(&self) {
        self.auth.sign_in(SecretString::from(TOKEN));
        self.engine.on_auth_changed(self.auth.is_signed_in()).await;
    }
}

#[tokio::test]
async fn test_guest_cart_never_touches_network() {
    let shop = open_shop().await;

    shop.engine.add_to_cart(&tea(), 2).await.unwrap();
    shop.engine.update_quantity(tea().id, 1).await.unwrap();

    assert_eq!(shop.engine.item_count(), 3);
    assert!(shop.stored_guest_cart().unwrap().contains("\"quantity\":3"));
    assert!(shop.mock.requests().is_empty());
}

#[tokio::test]
async fn test_login_merges_guest_cart_into_server_cart() {
    let shop = open_shop().await;
    shop.mock.seed(vec![CartItem::from_product(&mug(), 1)]);
    shop.engine.add_to_cart(&tea(), 5).await.unwrap();

    shop.sign_in().await;

    assert_eq!(shop.engine.state(), SessionState::Authenticated);
    assert!(shop.stored_guest_cart().is_none());
    assert_eq!(shop.engine.cart(), shop.mock.cart());
    assert_eq!(shop.engine.item_count(), 6);
    assert_eq!(shop.engine.total_amount(), Decimal::from(70));

    let routes_seen: Vec<_> = shop.mock.requests().iter().map(|r| r.route).collect();
    assert_eq!(routes_seen, vec![routes::SYNC, routes::FETCH]);
}

#[tokio::test]
async fn test_login_with_failing_sync_keeps_guest_lines() {
    let shop = open_shop().await;
    shop.engine.add_to_cart(&tea(), 5).await.unwrap();
    shop.mock
        .fail_route(routes::SYNC, StatusCode::INTERNAL_SERVER_ERROR, "sync broken");

    shop.sign_in().await;

    assert_eq!(shop.engine.state(), SessionState::Authenticated);
    assert!(shop.stored_guest_cart().is_some());
    // No server cart yet: the fetch 404 reads as empty
    assert!(shop.engine.cart().is_empty());

    shop.mock.recover_route(routes::SYNC);
    shop.engine.sync_cart().await.unwrap();
    assert_eq!(shop.engine.item_count(), 5);
    assert!(shop.stored_guest_cart().is_none());
}

#[tokio::test]
async fn test_server_rejection_is_shown_translated() {
    let shop = open_shop().await;
    shop.sign_in().await;
    let mut notices = shop.engine.notices();

    let err = shop.engine.add_to_cart(&mug(), 5).await.unwrap_err();

    assert!(!err.is_validation());
    assert!(shop.engine.cart().is_empty());
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::error("Niewystarczająca ilość produktu w magazynie")
    );
}

#[tokio::test]
async fn test_authenticated_operations_round_trip() {
    let shop = open_shop().await;
    shop.sign_in().await;

    shop.engine.add_to_cart(&tea(), 2).await.unwrap();
    shop.engine.set_quantity_input(tea().id, "4").await.unwrap();
    shop.engine.add_to_cart(&mug(), 1).await.unwrap();
    shop.engine.remove_from_cart(mug().id).await.unwrap();
    assert_eq!(shop.engine.cart(), shop.mock.cart());
    assert_eq!(shop.engine.item_count(), 4);

    shop.engine.remove_from_cart(ProductId::new(99)).await.unwrap();
    shop.engine.clear_cart().await.unwrap();
    assert!(shop.engine.cart().is_empty());
    assert!(shop.mock.cart().is_empty());
}

#[tokio::test]
async fn test_logout_returns_to_guest_cart() {
    let shop = open_shop().await;
    shop.sign_in().await;
    shop.engine.add_to_cart(&tea(), 2).await.unwrap();
    let requests = shop.mock.requests().len();

    shop.auth.sign_out();
    shop.engine.on_auth_changed(shop.auth.is_signed_in()).await;

    assert_eq!(shop.engine.state(), SessionState::Guest);
    assert!(shop.engine.cart().is_empty());
    assert_eq!(shop.mock.requests().len(), requests);

    shop.engine.add_to_cart(&mug(), 1).await.unwrap();
    assert_eq!(shop.mock.cart().quantity_of(mug().id), 0);
}

#[tokio::test]
async fn test_watch_auth_follows_session() {
    let shop = open_shop().await;
    shop.engine.add_to_cart(&tea(), 1).await.unwrap();
    let task = shop.engine.watch_auth(shop.auth.subscribe());

    shop.auth.sign_in(SecretString::from(TOKEN));
    tokio::time::timeout(Duration::from_secs(5), async {
        while shop.engine.state() != SessionState::Authenticated {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(shop.mock.cart().quantity_of(tea().id), 1);
    task.abort();
}
