use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use mpg_common::Paisa;
use mpg_engine::{
    db_types::{CommissionRate, GatewayCostEntry, Merchant},
    AccountApi,
};
use serde_json::json;

use super::helpers::{get_request, put_request};
use crate::{
    endpoint_tests::mocks::MockMerchantManager,
    routes::{MerchantRoute, TotalGatewayCostRoute, UpdateMerchantCommissionsRoute},
};

fn sample_merchant() -> Merchant {
    let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap();
    Merchant {
        id: 7,
        name: "Shop".into(),
        email: "shop@example.com".into(),
        website_url: None,
        api_key: "0123456789abcdef0123".into(),
        balance: Paisa::from_taka(490),
        total_payin: Paisa::from_taka(500),
        total_payout: Paisa::default(),
        getwaycost: Paisa::from_taka(10),
        deposit_commission: CommissionRate::from_basis_points(200).unwrap(),
        withdraw_commission: CommissionRate::from_basis_points(100).unwrap(),
        created_at,
        updated_at: created_at,
    }
}

#[actix_web::test]
async fn total_gateway_cost() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/api/admin/total-getwaycost", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"data":{"total_getwaycost":1234500}}"#);
}

#[actix_web::test]
async fn merchant_with_history() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/api/admin/merchant-key/7", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["name"], json!("Shop"));
    assert_eq!(body["data"]["getwaycost"], json!(1000));
    assert_eq!(body["data"]["deposit_commission"], json!(2.0));
    assert_eq!(body["data"]["getwaycost_history"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn unknown_merchant() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/api/admin/merchant-key/42", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({ "success": false, "error": "The data was not found. Merchant #42 does not exist" }));
}

#[actix_web::test]
async fn commission_out_of_range() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "deposit_commission": 150.0, "withdraw_commission": 1.0 });
    let (status, body) =
        put_request("/api/admin/merchant-key/7/commissions", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("must be a percentage between 0 and 100"), "{body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut merchant_manager = MockMerchantManager::new();
    merchant_manager.expect_fetch_total_gateway_cost().returning(|| Ok(Paisa::from_taka(12_345)));
    merchant_manager.expect_fetch_merchant().returning(|id| Ok((id == 7).then(sample_merchant)));
    merchant_manager.expect_fetch_gateway_cost_history().returning(|merchant_id| {
        let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap();
        Ok(vec![GatewayCostEntry { id: 1, merchant_id, amount: Paisa::from_taka(10), created_at }])
    });
    let accounts_api = AccountApi::new(merchant_manager);
    cfg.service(TotalGatewayCostRoute::<MockMerchantManager>::new())
        .service(MerchantRoute::<MockMerchantManager>::new())
        .service(UpdateMerchantCommissionsRoute::<MockMerchantManager>::new())
        .app_data(web::Data::new(accounts_api));
}
