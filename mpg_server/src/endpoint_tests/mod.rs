mod accounts;
mod helpers;
mod history;
mod mocks;
mod settlements;

use actix_web::{test, App};

use crate::routes::health;

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_and_read_body(&app, req).await;
    assert_eq!(resp, "👍️\n");
}
