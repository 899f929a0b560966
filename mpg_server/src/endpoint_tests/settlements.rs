//! Full request flows through the real SQLite backend.
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use mpg_engine::{
    helpers::SmsParser,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AccountApi,
    HistoryApi,
    LedgerDatabase,
    MatchWindow,
    ReconciliationApi,
    SettlementApi,
    SettlementConfig,
    SqliteDatabase,
};
use serde_json::{json, Value};

use crate::{
    config::ServerOptions,
    server::{configure_routes, json_config, path_config},
};

const AGENT_NUMBER: &str = "01712345678";
const CASH_OUT_SMS: &str = "Cash Out Tk 500 from 01712345678 to 01898765432. Fee Tk 5. Balance Tk 9500. TrxID XYZ1 \
                            at 01/06/2024 10:00";

async fn new_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn configure(cfg: &mut ServiceConfig, db: SqliteDatabase) {
    // The SMS below are dated 2024, so matching must not depend on the current date
    let reconciliation_api = ReconciliationApi::new(db.clone(), SmsParser::default(), MatchWindow::unbounded());
    cfg.app_data(web::Data::new(AccountApi::new(db.clone())))
        .app_data(web::Data::new(HistoryApi::new(db.clone())))
        .app_data(web::Data::new(SettlementApi::new(db, SettlementConfig::default())))
        .app_data(web::Data::new(reconciliation_api))
        .app_data(web::Data::new(ServerOptions::default()));
    configure_routes::<SqliteDatabase>(cfg);
}

async fn call<S, B>(app: &S, req: TestRequest) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn id_of(body: &Value) -> i64 {
    body["data"]["id"].as_i64().expect("Response has no id")
}

/// Onboards a merchant (2% / 1%) and an agent (1% / 0.5%) with one bKash account. Returns the merchant id.
async fn onboard<S, B>(app: &S) -> i64
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let merchant = json!({
        "name": "Shop", "email": "shop@example.com", "website_url": null,
        "deposit_commission": 2.0, "withdraw_commission": 1.0
    });
    let (status, body) = call(app, TestRequest::post().uri("/api/admin/merchant-key").set_json(merchant)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["api_key"].as_str().map(str::len), Some(20));
    let merchant_id = id_of(&body);

    let agent = json!({ "name": "Agent Rahim", "deposit_commission": 1.0, "withdraw_commission": 0.5 });
    let (status, body) = call(app, TestRequest::post().uri("/api/admin/agents").set_json(agent)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let agent_id = id_of(&body);
    let account = json!({ "provider": "bkash", "account_number": AGENT_NUMBER });
    let uri = format!("/api/admin/agents/{agent_id}/accounts");
    let (status, body) = call(app, TestRequest::post().uri(&uri).set_json(account.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], json!("active"));
    // The same number cannot be registered twice
    let (status, _) = call(app, TestRequest::post().uri(&uri).set_json(account)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    merchant_id
}

#[actix_web::test]
async fn sms_settles_payin() {
    let _ = env_logger::try_init().ok();
    let mut db = new_database().await;
    let app = App::new().app_data(json_config()).app_data(path_config()).configure(|cfg| configure(cfg, db.clone()));
    let app = test::init_service(app).await;
    let merchant_id = onboard(&app).await;

    let payin = json!({
        "merchant_id": merchant_id, "agent_account": AGENT_NUMBER, "payer_account": null,
        "expected_amount": 50_000, "provider": "bkash", "payment_type": "p2p"
    });
    let (status, body) = call(&app, TestRequest::post().uri("/api/admin/payin").set_json(payin)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], json!("pending"));
    let payin_id = id_of(&body);

    let sms = json!({
        "from": "bKash", "number": AGENT_NUMBER, "text": CASH_OUT_SMS,
        "sentStamp": 1_717_214_400_000_i64, "receivedStamp": 1_717_214_401_000_i64
    });
    let (status, body) = call(&app, TestRequest::post().uri("/api/payment/callbackSms").set_json(sms.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["outcome"], json!("payin_settled"));
    assert_eq!(body["data"]["payin"]["id"], json!(payin_id));
    assert_eq!(body["data"]["payin"]["status"], json!("completed"));
    assert_eq!(body["data"]["payin"]["transaction_id"], json!("XYZ1"));

    // Forwarding apps retry. The second copy must not touch the ledger.
    let (status, body) = call(&app, TestRequest::post().uri("/api/payment/callbackSms").set_json(sms)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["outcome"], json!("already_processed"));
    assert_eq!(body["data"]["transaction"], json!({ "kind": "payin", "id": payin_id }));

    let uri = format!("/api/admin/merchant-key/{merchant_id}");
    let (status, body) = call(&app, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["balance"], json!(49_000));
    assert_eq!(body["data"]["getwaycost"], json!(1_000));
    assert_eq!(body["data"]["getwaycost_history"].as_array().map(Vec::len), Some(1));

    let (_, body) = call(&app, TestRequest::get().uri("/api/admin/total-getwaycost")).await;
    assert_eq!(body["data"]["total_getwaycost"], json!(1_000));

    // Asking again for the status it already has changes nothing and answers with the record
    let uri = format!("/api/admin/payin/{payin_id}/status");
    let update = json!({ "status": "completed", "update_by": "admin" });
    let (status, body) = call(&app, TestRequest::patch().uri(&uri).set_json(update)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["id"], json!(payin_id));
    assert_eq!(body["data"]["status"], json!("completed"));

    let update = json!({ "status": "completed" });
    let (status, body) = call(&app, TestRequest::patch().uri("/api/admin/payin/abc/status").set_json(update)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    // A completed payin is final
    let update = json!({ "status": "rejected", "update_by": "admin" });
    let (status, body) = call(&app, TestRequest::patch().uri(&uri).set_json(update)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));

    let uri = format!("/api/merchant/transactions/{merchant_id}");
    let (status, body) = call(&app, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["payins"].as_array().map(Vec::len), Some(1));
    db.close().await.expect("Error closing database");
}

#[actix_web::test]
async fn unreadable_sms_is_kept() {
    let _ = env_logger::try_init().ok();
    let mut db = new_database().await;
    let app = App::new().app_data(json_config()).app_data(path_config()).configure(|cfg| configure(cfg, db.clone()));
    let app = test::init_service(app).await;

    let sms = json!({ "from": "bKash", "number": AGENT_NUMBER, "text": "Your OTP is 123456" });
    let (status, body) = call(&app, TestRequest::post().uri("/api/payment/callbackSms").set_json(sms)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());
    assert_eq!(body["data"]["outcome"], json!("needs_review"));
    let sms_id = body["data"]["forwarded_sms"]["id"].as_i64().expect("SMS was stored");

    let (status, body) = call(&app, TestRequest::get().uri("/api/admin/forward-sms")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["failure_reason"], json!("unrecognized-format"));

    let uri = format!("/api/admin/forward-sms/{sms_id}/status");
    let (status, body) = call(&app, TestRequest::patch().uri(&uri).set_json(json!({ "status": "used" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], json!("used"));

    // Garbage bodies are answered in the usual error shape
    let req = TestRequest::post().uri("/api/payment/callbackSms").insert_header(("content-type", "application/json"));
    let (status, body) = call(&app, req.set_payload("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    db.close().await.expect("Error closing database");
}

#[actix_web::test]
async fn withdrawal_flow() {
    let _ = env_logger::try_init().ok();
    let mut db = new_database().await;
    let app = App::new().app_data(json_config()).app_data(path_config()).configure(|cfg| configure(cfg, db.clone()));
    let app = test::init_service(app).await;
    let merchant_id = onboard(&app).await;

    // Tk 100,000 via a payment request
    let request = json!({
        "merchant_id": merchant_id, "email": "payer@example.com", "name": "Payer",
        "amount": 10_000_000, "provider": "bkash"
    });
    let (status, body) =
        call(&app, TestRequest::post().uri("/api/merchant/merchant-payment-request").set_json(request)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let uri = format!("/api/admin/merchant-payment/{}/status", id_of(&body));
    let (status, body) = call(&app, TestRequest::patch().uri(&uri).set_json(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let withdraw = |amount: i64| {
        json!({
            "merchant": merchant_id, "amount": amount, "paymentMethod": "bank_transfer",
            "paymentDetails": { "bank_name": "Sonali", "account_number": "0012", "account_name": "Shop Ltd" }
        })
    };
    let (status, body) = call(&app, TestRequest::post().uri("/api/merchant/withdraw").set_json(withdraw(6_000_000))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    let (status, body) = call(&app, TestRequest::post().uri("/api/merchant/withdraw").set_json(withdraw(4_000_000))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["payment_method"], json!("bank_transfer"));
    let withdrawal_id = id_of(&body);

    let (_, body) = call(&app, TestRequest::get().uri("/api/admin/withdraw-requests?status=pending")).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let uri = format!("/api/admin/withdraw-requests/{withdrawal_id}/status");
    let (status, body) = call(&app, TestRequest::patch().uri(&uri).set_json(json!({ "status": "rejected" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = call(&app, TestRequest::patch().uri(&uri).set_json(json!({ "status": "approved" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/api/admin/merchant-key/{merchant_id}");
    let (_, body) = call(&app, TestRequest::get().uri(&uri)).await;
    assert_eq!(body["data"]["balance"], json!(10_000_000));

    let missing = json!({
        "merchant": merchant_id, "amount": 200_000, "paymentMethod": "mobile_banking",
        "paymentDetails": { "provider": "bkash" }
    });
    let (status, _) = call(&app, TestRequest::post().uri("/api/merchant/withdraw").set_json(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    db.close().await.expect("Error closing database");
}
