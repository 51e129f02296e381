//! Process entry point: load settings, wire every store/client, build the
//! agent dependencies and HTTP router, then serve `/api/v1` until a
//! shutdown signal arrives.

use rag_finance_agent::agent::AgentDeps;
use rag_finance_agent::domain::{AgentConfig, ToolCategory};
use rag_finance_agent::http::auth::default_verifier;
use rag_finance_agent::http::{build_router, AppState};
use rag_finance_agent::ingestion::{IngestionConfig, IngestionCoordinator, SlackCollector, WhatsappCollector};
use rag_finance_agent::llm::{build_embedding_client, build_llm_client};
use rag_finance_agent::notifier::Notifier;
use rag_finance_agent::observability::init_tracing;
use rag_finance_agent::pii::Gazetteer;
use rag_finance_agent::settings::Settings;
use rag_finance_agent::store::{
    AuditLog, HistoryWindowLimits, InMemoryConfigStore, InMemoryMcpServerStore, InMemorySessionStore,
    InMemoryVectorStore,
};
use rag_finance_agent::tools::{calculator, ToolRegistry};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::from_env()?;
    let settings = Arc::new(settings);

    let seed_config = AgentConfig::default_for_environment("main", &settings.environment);

    let config_store = Arc::new(InMemoryConfigStore::new().with_default_config("main", &settings.environment));
    let vector_store = InMemoryVectorStore::shared();
    let session_store = InMemorySessionStore::shared();
    let mcp_store = InMemoryMcpServerStore::shared();
    let audit_log = AuditLog::shared();

    let llm_client = build_llm_client(&seed_config, &settings.llm_base_url, &settings.llm_api_key, "embedding");
    let embedding_client = build_embedding_client(&settings.embedding_base_url, &settings.embedding_api_key, "embedding");

    let tool_registry = Arc::new(ToolRegistry::new());
    for tool in calculator::builtin_tools() {
        tool_registry.register_local(tool, ToolCategory::Calculation);
    }

    let notifier = Notifier::spawn(settings.error_notifier_webhook_url.clone());

    let ingestion_config = IngestionConfig {
        queue_depth: settings.ingestion_queue_depth,
        workers_per_source: settings.ingestion_worker_count,
        pii_enabled: settings.pii_anonymization_enabled,
        pii_strategy: match settings.pii_default_strategy.as_str() {
            "replace" => rag_finance_agent::pii::PiiStrategy::Replace,
            "mask" => rag_finance_agent::pii::PiiStrategy::Mask,
            "hash" => rag_finance_agent::pii::PiiStrategy::Hash,
            "keep" => rag_finance_agent::pii::PiiStrategy::Keep,
            _ => rag_finance_agent::pii::PiiStrategy::Redact,
        },
        pii_min_score: settings.pii_min_confidence_score,
        ..Default::default()
    };
    let ingestion = IngestionCoordinator::new(
        ingestion_config,
        vector_store.clone(),
        embedding_client.clone(),
        Arc::new(Gazetteer::default()),
    );

    let slack_collector = settings.slack_signing_secret.clone().map(|secret| Arc::new(SlackCollector::new(secret)));
    let whatsapp_collector = settings.whatsapp_signing_secret.clone().map(|secret| Arc::new(WhatsappCollector::new(secret)));

    // Telegram's primary ingress is a long-lived MTProto-shaped listener
    // (`TelegramCollector::run_listener_supervised`), but this crate vendors
    // no concrete `TelegramTransport` (out of scope, §1) — only the signed
    // webhook path is wired here, gated on the signing secret alone.
    let telegram_signing_secret = settings.telegram_signing_secret.clone().map(Arc::<str>::from);

    let deps = Arc::new(AgentDeps {
        config_store: config_store.clone(),
        prompt_store: config_store.clone(),
        vector_store: vector_store.clone(),
        session_store: session_store.clone(),
        llm_client,
        embedding_client,
        tool_registry,
        environment: settings.environment.clone(),
        history_limits: HistoryWindowLimits { message_cap: settings.history_message_cap, token_cap: settings.history_token_cap },
    });

    let state = AppState {
        deps: deps.clone(),
        mcp_store,
        ingestion: ingestion.clone(),
        notifier,
        settings: settings.clone(),
        token_verifier: default_verifier(),
        audit_log,
        slack_collector,
        whatsapp_collector,
        telegram_signing_secret,
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr.as_str()).await?;
    info!(bind_addr = %settings.bind_addr, environment = %settings.environment, "starting finance ops retrieval agent");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    ingestion.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining ingestion queues");
}
