use actix::prelude::*;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use packing_dispatch::config::DispatchConfig;
use packing_dispatch::dispatch::{DeadLetterActor, DispatchService, GetDlqStats};
use packing_dispatch::domain::order::{Order, OrderItem};
use packing_dispatch::domain::user::{ActingWholesaler, Role, UserProfile};
use packing_dispatch::estimator::Estimator;
use packing_dispatch::messaging::{LoggingGateway, MessagingGateway, RedpandaSmsGateway, SMS_TOPIC};
use packing_dispatch::metrics::{self, Metrics};
use packing_dispatch::store::{
    DeadLetterRepository, DocumentStore, InMemoryDocumentStore, OrderRepository, ScyllaDocumentStore,
    UserDirectory,
};
use packing_dispatch::workflow::PackingOrchestrator;

#[derive(Parser)]
#[command(name = "packing-dispatch")]
struct Args {
    /// Enables real distance lookups; without it every estimate is a fallback
    #[arg(long, env = "DISTANCE_MATRIX_API_KEY")]
    distance_matrix_api_key: Option<String>,

    /// ScyllaDB node; the in-memory store is used when absent
    #[arg(long, env = "SCYLLA_NODE")]
    scylla_node: Option<String>,

    #[arg(long, env = "SCYLLA_KEYSPACE", default_value = "packing_ks")]
    scylla_keyspace: String,

    /// Redpanda brokers for outbound SMS; messages are only logged when absent
    #[arg(long, env = "KAFKA_BROKERS")]
    kafka_brokers: Option<String>,

    #[arg(long, env = "SMS_TOPIC", default_value = SMS_TOPIC)]
    sms_topic: String,

    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    #[arg(long, env = "FAN_OUT_WORKERS", default_value = "4")]
    fan_out_workers: usize,
}

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, override with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,packing_dispatch=debug")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("🚀 Starting packing dispatch demo");

    let config = DispatchConfig {
        fan_out_workers: args.fan_out_workers,
        ..DispatchConfig::default()
    }
    .with_distance_matrix(args.distance_matrix_api_key.clone());

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = args.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Metrics runtime error: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Document store ===
    let store: Arc<dyn DocumentStore> = match &args.scylla_node {
        Some(node) => Arc::new(ScyllaDocumentStore::connect(node, &args.scylla_keyspace).await?),
        None => {
            tracing::info!("No SCYLLA_NODE set, using the in-memory store");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    // === 3. SMS gateway ===
    let gateway: Arc<dyn MessagingGateway> = match &args.kafka_brokers {
        Some(brokers) => Arc::new(RedpandaSmsGateway::new(brokers, args.sms_topic.clone())?.with_metrics(metrics.clone())),
        None => Arc::new(LoggingGateway),
    };

    // === 4. Dead letter actor, dispatch, orchestrator ===
    let dlq = DeadLetterActor::new(DeadLetterRepository::new(store.clone()), Some(metrics.clone())).start();

    let dispatch = DispatchService::new(store.clone(), gateway, &config)
        .with_dead_letter_actor(dlq.clone())
        .with_metrics(metrics.clone());
    let estimator = Arc::new(Estimator::from_config(&config, Some(metrics.clone())));
    let orchestrator =
        PackingOrchestrator::new(store.clone(), estimator, dispatch, &config).with_metrics(metrics.clone());

    // === 5. Demo data ===
    let (wholesaler, order) = seed(store.clone()).await?;

    // === 6. Pack the order twice; the second call finds nothing left to do ===
    tracing::info!("📦 Marking order {} packed", order.id);
    let outcome = orchestrator.mark_packed(&order, &wholesaler).await?;
    tracing::info!(
        order_id = %outcome.order.id,
        status = %outcome.order.status,
        claim = ?outcome.claim,
        notified = outcome.notified(),
        complete = outcome.is_complete(),
        "✅ Packing finished"
    );

    let again = orchestrator.mark_packed(&order, &wholesaler).await?;
    tracing::info!(claim = ?again.claim, broadcast = ?again.broadcast, "🔁 Second call");

    match dlq.send(GetDlqStats).await? {
        Ok(stats) => tracing::info!(dead_letters = stats.total_messages, "💀 Dead letter queue"),
        Err(e) => tracing::warn!(error = %e, "Could not read dead letter stats"),
    }

    tracing::info!("🎉 Demo complete!");
    Ok(())
}

async fn seed(store: Arc<dyn DocumentStore>) -> anyhow::Result<(ActingWholesaler, Order)> {
    let users = UserDirectory::new(store.clone());

    let wholesaler = UserProfile::new("W1", "Asha Verma", Role::Wholesaler)
        .with_shop("Verma Wholesale", "Azadpur Mandi, Delhi")
        .with_phone("+91-9810000001");
    users.put(&wholesaler).await?;
    users
        .put(
            &UserProfile::new("R1", "Ravi Kumar", Role::Retailer)
                .with_shop("Ravi Kirana Store", "Sector 14, Gurgaon")
                .with_phone("+91-9810000002"),
        )
        .await?;
    for (id, name) in [("V1", "Mohan"), ("V2", "Salim"), ("V3", "Gurpreet")] {
        users
            .put(&UserProfile::new(id, name, Role::VehicleOwner).with_phone("+91-9899000000"))
            .await?;
    }

    let mut order = Order::new(
        "O1",
        "R1",
        "W1",
        vec![
            OrderItem::new("Basmati Rice", 25.0, "kg", 90.0),
            OrderItem::new("Toor Dal", 10.0, "kg", 140.0),
        ],
    )?;
    order.confirm()?;
    OrderRepository::new(store).put(&order).await?;

    Ok((ActingWholesaler::from(&wholesaler), order))
}
