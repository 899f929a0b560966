use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{DateTime, TimeZone, Utc};
use mpg_common::Paisa;
use mpg_engine::{
    db_types::{ForwardedSms, ForwardedSmsStatus, PaymentDetails, UpiDetails, WithdrawRequest, WithdrawStatus},
    HistoryApi,
};
use serde_json::json;

use super::helpers::get_request;
use crate::{
    endpoint_tests::mocks::MockTransactionDb,
    routes::{ForwardedSmsRoute, PayinRoute, WithdrawRequestsRoute},
};

fn stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap()
}

fn unread_sms() -> ForwardedSms {
    ForwardedSms {
        id: 3,
        provider: "bkash".into(),
        agent_number: Some("01712345678".into()),
        text: "Your OTP is 123456".into(),
        direction: None,
        amount: None,
        from_account: None,
        to_account: None,
        transaction_id: None,
        sms_timestamp: None,
        sent_stamp: Some("1717214400000".into()),
        received_stamp: None,
        failure_reason: Some("unrecognized-format".into()),
        status: ForwardedSmsStatus::Arrived,
        created_at: stamp(),
        updated_at: stamp(),
    }
}

fn pending_withdrawal() -> WithdrawRequest {
    WithdrawRequest {
        id: 11,
        merchant_id: 7,
        amount: Paisa::from_taka(40_000),
        payment_details: PaymentDetails::Upi(UpiDetails { upi_id: "shop@upi".into() }),
        status: WithdrawStatus::Pending,
        created_at: stamp(),
        updated_at: stamp(),
    }
}

#[actix_web::test]
async fn forwarded_sms_for_review() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/api/admin/forward-sms", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    let sms = &body["data"][0];
    assert_eq!(sms["id"], json!(3));
    assert_eq!(sms["failure_reason"], json!("unrecognized-format"));
    assert_eq!(sms["status"], json!("arrived"));
}

#[actix_web::test]
async fn withdrawals_filtered_by_status() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/api/admin/withdraw-requests?status=pending", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    let withdrawal = &body["data"][0];
    assert_eq!(withdrawal["amount"], json!(4_000_000));
    assert_eq!(withdrawal["payment_method"], json!("upi"));
    assert_eq!(withdrawal["payment_details"]["upi_id"], json!("shop@upi"));

    let (status, body) =
        get_request("/api/admin/withdraw-requests?status=approved", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"data":[]}"#);

    let (status, _) =
        get_request("/api/admin/withdraw-requests?status=processed", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_payin() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/api/admin/payin/99", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Payin #99 does not exist"), "{body}");
}

#[actix_web::test]
async fn malformed_payin_id() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/api/admin/payin/abc", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().starts_with("Could not read request path"), "{body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockTransactionDb::new();
    store.expect_fetch_all_forwarded_sms().returning(|| Ok(vec![unread_sms()]));
    store.expect_fetch_withdrawals().returning(|status| match status {
        Some(WithdrawStatus::Pending) | None => Ok(vec![pending_withdrawal()]),
        Some(_) => Ok(vec![]),
    });
    store.expect_fetch_payin().returning(|_| Ok(None));
    let history_api = HistoryApi::new(store);
    cfg.service(ForwardedSmsRoute::<MockTransactionDb>::new())
        .service(WithdrawRequestsRoute::<MockTransactionDb>::new())
        .service(PayinRoute::<MockTransactionDb>::new())
        .app_data(web::Data::new(history_api));
}
