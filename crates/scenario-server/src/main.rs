//! Scenario rule service
//!
//! Composition root: wires the rule store, the clients for the surrounding
//! services, the condition synchronizer, the trigger evaluator, and the
//! REST API together, then serves until interrupted.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use scenario_api::AppState;
use scenario_clients::{
    CallbackTarget, CommandClient, HttpCommand, HttpNotification, HttpRegistry, HttpScheduler,
    HttpStreamEngine, NotificationClient, RegistryClient, SchedulerClient, StreamEngineClient,
};
use scenario_config::ServiceConfig;
use scenario_engine::{ConditionSynchronizer, RuleService, TriggerEvaluator, SERVICE_NAME};
use scenario_store::RuleStore;

const CONFIG_PATH_VAR: &str = "SCENARIO_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "configuration.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting scenario rule service");

    let config_path =
        std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ServiceConfig::load_or_default(&config_path)?;

    let http = reqwest::Client::new();
    let registry: Arc<dyn RegistryClient> =
        Arc::new(HttpRegistry::new(http.clone(), &config.clients.registry));
    let scheduler: Arc<dyn SchedulerClient> =
        Arc::new(HttpScheduler::new(http.clone(), &config.clients.scheduler));
    let stream: Arc<dyn StreamEngineClient> = Arc::new(HttpStreamEngine::new(
        http.clone(),
        &config.clients.stream_engine,
    ));
    let commands: Arc<dyn CommandClient> =
        Arc::new(HttpCommand::new(http.clone(), &config.clients.command));
    let notifications: Arc<dyn NotificationClient> =
        Arc::new(HttpNotification::new(http, &config.clients.notification));

    let callback = CallbackTarget {
        host: config.service.host.clone(),
        port: config.service.port,
    };

    let store = Arc::new(RuleStore::new());
    let synchronizer = Arc::new(ConditionSynchronizer::new(
        scheduler,
        stream,
        callback,
        config.stream_name.clone(),
    ));

    synchronizer.ensure_stream().await?;

    let rules = Arc::new(RuleService::new(
        store.clone(),
        synchronizer,
        registry,
    ));
    let loaded = rules.reconcile_startup().await?;
    info!(loaded, "rules restored from registry");

    let evaluator = Arc::new(TriggerEvaluator::new(
        store,
        commands,
        notifications,
        SERVICE_NAME,
    ));
    let (triggers, evaluator_task) = evaluator.start();

    let state = AppState { rules, triggers };
    let addr = format!("{}:{}", config.service.host, config.service.port);

    tokio::select! {
        result = scenario_api::start_server(state, &addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    drop(evaluator_task);
    Ok(())
}
