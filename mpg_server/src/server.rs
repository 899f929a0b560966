use std::time::Duration;

use actix_web::{
    dev::Server,
    error::{JsonPayloadError, PathError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use log::*;
use mpg_engine::{
    helpers::SmsParser,
    AccountApi,
    HistoryApi,
    LedgerDatabase,
    ReconciliationApi,
    SettlementApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    routes::{
        health,
        AddAgentAccountRoute,
        AgentAccountsRoute,
        CallbackSmsRoute,
        CreateAgentRoute,
        CreateMerchantRoute,
        CreatePaymentRequestRoute,
        CreatePayinRoute,
        CreatePayoutRoute,
        ForwardedSmsRoute,
        MerchantRoute,
        MerchantTransactionsRoute,
        PayinRoute,
        PaymentRequestRoute,
        PayoutRoute,
        TotalGatewayCostRoute,
        UpdateAgentCommissionsRoute,
        UpdateForwardedSmsStatusRoute,
        UpdateMerchantCommissionsRoute,
        UpdateMerchantPaymentStatusRoute,
        UpdatePayinStatusRoute,
        UpdatePayoutStatusRoute,
        UpdateWithdrawStatusRoute,
        WithdrawRequestsRoute,
        WithdrawRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let mut db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database is ready at {}", config.database_url);
    let srv = create_server_instance(config, db.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    if let Err(e) = db.close().await {
        warn!("🗃️ Could not close the database cleanly. {e}");
    }
    result
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let settlement_config = config.settlement_config()?;
    let window = config.match_window();
    let options = ServerOptions::from_config(&config);
    let utc_offset = config.sms_utc_offset_hours;
    let srv = HttpServer::new(move || {
        let accounts_api = AccountApi::new(db.clone());
        let history_api = HistoryApi::new(db.clone());
        let settlement_api = SettlementApi::new(db.clone(), settlement_config);
        let reconciliation_api =
            ReconciliationApi::new(db.clone(), SmsParser::with_utc_offset_hours(utc_offset), window);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mpg::access_log"))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(history_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(options))
            .service(health)
            .configure(configure_routes::<SqliteDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Registers every gateway route against backend `B`.
pub fn configure_routes<B: LedgerDatabase + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(CallbackSmsRoute::<B>::new())
        .service(UpdatePayinStatusRoute::<B>::new())
        .service(UpdatePayoutStatusRoute::<B>::new())
        .service(UpdateWithdrawStatusRoute::<B>::new())
        .service(UpdateMerchantPaymentStatusRoute::<B>::new())
        .service(UpdateForwardedSmsStatusRoute::<B>::new())
        .service(WithdrawRoute::<B>::new())
        .service(CreatePayinRoute::<B>::new())
        .service(CreatePayoutRoute::<B>::new())
        .service(CreatePaymentRequestRoute::<B>::new())
        .service(PayinRoute::<B>::new())
        .service(PayoutRoute::<B>::new())
        .service(PaymentRequestRoute::<B>::new())
        .service(ForwardedSmsRoute::<B>::new())
        .service(WithdrawRequestsRoute::<B>::new())
        .service(MerchantTransactionsRoute::<B>::new())
        .service(CreateMerchantRoute::<B>::new())
        .service(MerchantRoute::<B>::new())
        .service(UpdateMerchantCommissionsRoute::<B>::new())
        .service(TotalGatewayCostRoute::<B>::new())
        .service(CreateAgentRoute::<B>::new())
        .service(UpdateAgentCommissionsRoute::<B>::new())
        .service(AddAgentAccountRoute::<B>::new())
        .service(AgentAccountsRoute::<B>::new());
}

/// Malformed JSON bodies are answered in the same `{success, error}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

/// Path segments that do not parse, e.g. a non-numeric id, get the same treatment.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: PathError, _req| {
        debug!("💻️ Rejecting request path. {err}");
        ServerError::InvalidRequestPath(err.to_string()).into()
    })
}
