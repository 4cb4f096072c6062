use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use caseflow::cases::{
    case_router, BuiltinProcedures, CaseService, InMemoryCaseStore, TenantId,
};
use caseflow::config::AppConfig;
use caseflow::credits::{
    credit_router, CreditLedger, InMemoryCreditStore, REASON_DOCUMENT_EXPORT,
};
use caseflow::error::AppError;
use caseflow::telemetry;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "caseflow",
    about = "Run the multi-tenant case lifecycle service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a demo case through the full lifecycle and print each step
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Tenant the demo case belongs to
    #[arg(long, default_value = "demo-tenant")]
    tenant: String,
    /// Procedure code to bind
    #[arg(long, default_value = "import_declaration")]
    procedure: String,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(InMemoryCaseStore::new());
    let registry = Arc::new(BuiltinProcedures::standard());
    let service = Arc::new(CaseService::new(store, registry, config.limits.clone()));

    let credit_store = Arc::new(InMemoryCreditStore::new());
    let ledger = Arc::new(CreditLedger::new(
        credit_store,
        config.limits.starting_credits,
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(case_router(service))
        .merge(credit_router(ledger))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "case lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryCaseStore::new());
    let registry = Arc::new(BuiltinProcedures::standard());
    let service = CaseService::new(store, registry, Default::default());
    let ledger = CreditLedger::new(Arc::new(InMemoryCreditStore::new()), 3);

    let tenant = TenantId(args.tenant.clone());

    println!("Case lifecycle demo (tenant {})", args.tenant);

    let case = service.create_case(&tenant, "Demo shipment")?;
    println!("- created {} in status {}", case.id.0, case.status);

    let case = service.bind_procedure(&tenant, &case.id, &args.procedure, None)?;
    println!(
        "- bound procedure {} -> status {}",
        args.procedure, case.status
    );

    let fields = [
        ("goods_description", json!("Machine parts")),
        ("goods_category", json!("MACHINERY")),
        ("declared_value", json!(1250.0)),
        ("declared_currency", json!("EUR")),
        ("commercial_goods", json!(false)),
        ("sender_name", json!("Example Sender GmbH")),
        ("recipient_name", json!("Example Recipient AG")),
        ("origin_country", json!("CH")),
        ("destination_country", json!("DE")),
        ("transport_mode", json!("ROAD")),
        ("package_count", json!(4)),
    ];
    for (key, value) in fields {
        service.upsert_field(&tenant, &case.id, key, value)?;
    }
    println!("- filled {} fields", service.get_case(&tenant, &case.id)?.fields.len());

    for step in ["goods", "parties", "transport", "review"] {
        service.complete_wizard_step(&tenant, &case.id, step)?;
    }
    println!("- wizard completed");

    let snapshot = service.submit(&tenant, &case.id)?;
    println!(
        "- submitted at version {} ({} validation issue(s))",
        snapshot.version,
        snapshot.validation.errors.len()
    );

    let balance = ledger.consume(
        &tenant,
        1,
        REASON_DOCUMENT_EXPORT,
        None,
        Some(json!({ "case_id": snapshot.case_id.0 })),
    )?;
    println!("- exported document, {} credit(s) remaining", balance.balance);

    let case = service.complete(&tenant, &case.id)?;
    println!(
        "- completed at {}",
        case.completed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default()
    );

    let case = service.archive(&tenant, &case.id)?;
    println!("- archived, final status {}", case.status);

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
