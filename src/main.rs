use std::sync::Arc;

use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use farmlink_orders::{
    ActorRole, AuditLog, DisputeHandler, DisputeResolution, EscrowController, InMemoryAuditLog,
    InMemoryEscrowStore, InMemoryOrderStore, InMemoryPaymentChannel, LineItem, OrderService,
    OrderStatus, TransitionPayload,
};
use farmlink_orders::utils::RetryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,farmlink_orders=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order lifecycle & escrow settlement demo");

    // === 1. Wire the in-memory infrastructure ===
    let order_store = Arc::new(InMemoryOrderStore::new());
    let escrow_store = Arc::new(InMemoryEscrowStore::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let channel = Arc::new(InMemoryPaymentChannel::new());

    let escrow = Arc::new(EscrowController::new(
        escrow_store,
        audit.clone(),
        channel.clone(),
        RetryConfig::default(),
    ));
    let service = Arc::new(OrderService::new(order_store, audit.clone(), escrow));
    let disputes = DisputeHandler::new(service.clone());

    let buyer = Uuid::new_v4();
    let seller_a = Uuid::new_v4();
    let seller_b = Uuid::new_v4();
    let admin = Uuid::new_v4();

    // === 2. Checkout: two sellers, funds captured and held ===
    let order = service
        .create(
            buyer,
            vec![
                LineItem {
                    product_id: Uuid::new_v4(),
                    seller_id: seller_a,
                    quantity: 2,
                    unit_price_snapshot: Decimal::from(100),
                },
                LineItem {
                    product_id: Uuid::new_v4(),
                    seller_id: seller_b,
                    quantity: 1,
                    unit_price_snapshot: Decimal::from(250),
                },
            ],
            "12 Orchard Lane, Green Valley".into(),
            format!("pay-{}", Uuid::new_v4()),
        )
        .await?;
    tracing::info!("✅ Order created: {} (total {})", order.id, order.total_amount);

    // === 3. Fulfillment: approve, ship, complete ===
    let order = service
        .request_transition(order.id, admin, ActorRole::Admin, OrderStatus::Processing, 1, TransitionPayload::default())
        .await?;
    tracing::info!("✅ Order approved by admin (version {})", order.version);

    let order = service
        .request_transition(order.id, seller_a, ActorRole::Seller, OrderStatus::Shipped, 2, TransitionPayload::default())
        .await?;
    tracing::info!("✅ Order shipped by seller (version {})", order.version);

    let order = service
        .request_transition(order.id, buyer, ActorRole::Buyer, OrderStatus::Completed, 3, TransitionPayload::default())
        .await?;
    tracing::info!("✅ Order completed, escrow released to both sellers");

    tracing::info!(
        "💰 Seller A credited: {}, Seller B credited: {}",
        channel.credited_total(seller_a).await,
        channel.credited_total(seller_b).await,
    );

    // === 4. A second order goes to dispute and is refunded ===
    let second = service
        .create(
            buyer,
            vec![LineItem {
                product_id: Uuid::new_v4(),
                seller_id: seller_a,
                quantity: 3,
                unit_price_snapshot: Decimal::from(40),
            }],
            "12 Orchard Lane, Green Valley".into(),
            format!("pay-{}", Uuid::new_v4()),
        )
        .await?;
    service
        .request_transition(second.id, admin, ActorRole::Admin, OrderStatus::Processing, 1, TransitionPayload::default())
        .await?;
    service
        .request_transition(second.id, seller_a, ActorRole::Seller, OrderStatus::Shipped, 2, TransitionPayload::default())
        .await?;

    let disputed = disputes
        .raise_dispute(second.id, buyer, "crate arrived damaged".into(), 3)
        .await?;
    tracing::info!("⚖️  Dispute raised on order {}", disputed.id);

    let resolved = disputes
        .resolve_dispute(second.id, admin, DisputeResolution::Refund, Some("photos confirm damage".into()), 4)
        .await?;
    tracing::info!(
        "✅ Dispute resolved: status {:?}, payment {:?}",
        resolved.status,
        resolved.payment_status,
    );

    // === 5. Print both audit trails ===
    for id in [order.id, second.id] {
        tracing::info!("📜 Audit trail for order {}", id);
        for entry in audit.list(id).await {
            tracing::info!(
                "   {} {:?} by {:?} (amount {})",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.action,
                entry.actor_role,
                entry.amount_involved,
            );
        }
    }

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
