use anyhow::{Context, Result};
use client::OrderBook;
use shared::models::{Order, OrderStatus};

use super::session::App;

pub async fn list(app: &App, status: Option<OrderStatus>) -> Result<()> {
    app.require_session().await?;
    let book = OrderBook::load(&app.client)
        .await
        .context("failed to fetch orders")?;

    let mut shown = 0;
    println!(
        "{:<6} {:<10} {:>10}  {:<20} CUSTOMER",
        "ID", "STATUS", "TOTAL", "CREATED"
    );
    for order in book.filter(status) {
        println!(
            "{:<6} {:<10} {:>10}  {:<20} {}",
            order.id,
            order.status.as_str(),
            order.total_price,
            order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            order.customer_name.as_deref().unwrap_or("-"),
        );
        shown += 1;
    }
    if shown == 0 {
        println!("No orders found.");
    }
    Ok(())
}

pub async fn show(app: &App, id: i64) -> Result<()> {
    app.require_session().await?;
    let order = app
        .client
        .get_order(id)
        .await
        .with_context(|| format!("failed to fetch order {id}"))?;
    print_order(&order);
    Ok(())
}

pub async fn cancel(app: &App, id: i64) -> Result<()> {
    app.require_session().await?;
    let mut book = OrderBook::load(&app.client)
        .await
        .context("failed to fetch orders")?;
    let order = book
        .cancel(&app.client, id)
        .await
        .with_context(|| format!("failed to cancel order {id}"))?;
    println!("Order {} is now {}", order.id, order.status);
    Ok(())
}

pub async fn set_status(app: &App, id: i64, status: OrderStatus) -> Result<()> {
    app.require_session().await?;
    let mut book = OrderBook::load(&app.client)
        .await
        .context("failed to fetch orders")?;
    let order = book
        .set_status(&app.client, id, status)
        .await
        .with_context(|| format!("failed to update order {id}"))?;
    println!("Order {} is now {}", order.id, order.status);
    Ok(())
}

pub async fn set_price(app: &App, id: i64, price: &str) -> Result<()> {
    app.require_session().await?;
    let mut book = OrderBook::load(&app.client)
        .await
        .context("failed to fetch orders")?;
    let order = book
        .set_price(&app.client, id, price)
        .await
        .with_context(|| format!("failed to price order {id}"))?;
    println!("Order {} total is now {}", order.id, order.total_price);
    Ok(())
}

pub async fn report(app: &App) -> Result<()> {
    app.require_session().await?;
    let report = app
        .client
        .order_report()
        .await
        .context("failed to fetch order report")?;
    println!("total orders: {}", report.total_orders);
    println!("completed:    {}", report.completed);
    println!("pending:      {}", report.pending);
    println!("rejected:     {}", report.rejected);
    println!("revenue:      {:.2}", report.total_revenue);
    Ok(())
}

fn print_order(order: &Order) {
    println!("Order {}: {}", order.id, order.status);
    if let Some(customer) = &order.customer_name {
        println!("customer: {customer}");
    }
    println!("total: {}", order.total_price);
    println!("created: {}", order.created_at.to_rfc3339());
    println!("updated: {}", order.updated_at.to_rfc3339());
    for item in &order.items {
        println!(
            "  - {} x{} @ {}: {}",
            item.order_name, item.quantity, item.price, item.order_details
        );
    }
}
