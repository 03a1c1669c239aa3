//! Cart commands.
//!
//! Each command runs one engine operation against the session's backing
//! store; `main` prints the resulting cart afterwards.

use basket_core::{Product, ProductId};
use rust_decimal::Decimal;
use serde_json::json;

use super::{CommandError, Session};

/// Add `quantity` units of a product described on the command line.
pub async fn add(
    session: &Session,
    id: i32,
    name: String,
    price: Decimal,
    quantity: i32,
    stock: Option<i32>,
) -> Result<(), CommandError> {
    let mut product = Product::new(ProductId::new(id), name, price);
    if let Some(stock) = stock {
        product = product.with_stock(stock);
    }

    tracing::info!(product_id = id, quantity, "Adding to cart");
    session.engine().add_to_cart(&product, quantity).await?;
    Ok(())
}

/// Set a line from text input.
pub async fn set(session: &Session, id: i32, quantity: &str) -> Result<(), CommandError> {
    session
        .engine()
        .set_quantity_input(ProductId::new(id), quantity)
        .await?;
    Ok(())
}

pub async fn bump(session: &Session, id: i32, delta: i32) -> Result<(), CommandError> {
    session
        .engine()
        .update_quantity(ProductId::new(id), delta)
        .await?;
    Ok(())
}

pub async fn remove(session: &Session, id: i32) -> Result<(), CommandError> {
    session
        .engine()
        .remove_from_cart(ProductId::new(id))
        .await?;
    Ok(())
}

pub async fn clear(session: &Session) -> Result<(), CommandError> {
    session.engine().clear_cart().await?;
    Ok(())
}

pub async fn sync(session: &Session) -> Result<(), CommandError> {
    session.engine().sync_cart().await?;
    Ok(())
}

/// Print the published cart as JSON.
#[allow(clippy::print_stdout)]
pub fn show(session: &Session) -> Result<(), CommandError> {
    let engine = session.engine();
    let output = json!({
        "signedIn": session.is_signed_in(),
        "state": engine.state(),
        "cart": engine.cart(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
