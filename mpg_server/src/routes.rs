//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every storage call in the engine is async, so handlers must always
//! `.await` them rather than blocking on them.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use mpg_engine::{
    db_types::{
        ForwardedSmsStatus,
        NewAgent,
        NewAgentAccount,
        NewMerchant,
        NewPayin,
        NewPaymentRequest,
        NewPayout,
        PayinStatus,
        PaymentRequestStatus,
        PayoutStatus,
        WithdrawStatus,
    },
    AccountApi,
    HistoryApi,
    LedgerDatabase,
    LedgerError,
    MerchantManagement,
    ReconciliationApi,
    SettlementApi,
    SmsForward,
    SmsOutcome,
    TransactionStore,
};

use crate::{
    config::ServerOptions,
    data_objects::{
        ApiResponse,
        CallbackSms,
        CommissionParams,
        StatusUpdate,
        TotalGatewayCost,
        WithdrawParams,
        WithdrawQuery,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn ok_json<T: serde::Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(data))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   SMS webhook  ----------------------------------------------------
route!(callback_sms => Post "/api/payment/callbackSms" impl LedgerDatabase);
/// Route handler for SMS forwarded from agent handsets.
///
/// Every well-formed request is answered with a 200. An SMS that could not be read is stored for manual review, and
/// the response carries `success: false` along with the reason, so that the forwarding app does not retry it.
pub async fn callback_sms<B: LedgerDatabase>(
    req: HttpRequest,
    body: web::Json<CallbackSms>,
    api: web::Data<ReconciliationApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let sms = SmsForward::from(body.into_inner());
    let peer = get_remote_ip(&req, *options.get_ref()).map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".into());
    info!("💻️ Received {} SMS for {:?} from {peer}", sms.provider, sms.number);
    let outcome = api.process_sms(sms).await?;
    let review_reason = match &outcome {
        SmsOutcome::NeedsReview { reason, .. } => Some(reason.clone()),
        _ => None,
    };
    let response = match review_reason {
        Some(reason) => ApiResponse::failure_with(outcome, reason),
        None => ApiResponse::success(outcome),
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Settlements  ----------------------------------------------------
route!(update_payin_status => Patch "/api/admin/payin/{id}/status" impl LedgerDatabase);
pub async fn update_payin_status<B: LedgerDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdate<PayinStatus>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let StatusUpdate { status, update_by } = body.into_inner();
    debug!("💻️ PATCH payin #{id} status to {status}");
    let payin = api.update_payin_status(id, status, update_by).await?;
    Ok(ok_json(payin))
}

route!(update_payout_status => Put "/api/admin/change-payout-status/{id}" impl LedgerDatabase);
pub async fn update_payout_status<B: LedgerDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdate<PayoutStatus>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let StatusUpdate { status, update_by } = body.into_inner();
    debug!("💻️ PUT payout #{id} status to {status}");
    let payout = api.update_payout_status(id, status, update_by).await?;
    Ok(ok_json(payout))
}

route!(update_withdraw_status => Patch "/api/admin/withdraw-requests/{id}/status" impl LedgerDatabase);
pub async fn update_withdraw_status<B: LedgerDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdate<WithdrawStatus>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ PATCH withdrawal request #{id} status to {status}");
    let withdrawal = api.update_withdrawal_status(id, status).await?;
    Ok(ok_json(withdrawal))
}

route!(update_merchant_payment_status => Patch "/api/admin/merchant-payment/{id}/status" impl LedgerDatabase);
pub async fn update_merchant_payment_status<B: LedgerDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdate<PaymentRequestStatus>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ PATCH payment request #{id} status to {status}");
    let request = api.update_payment_request_status(id, status).await?;
    Ok(ok_json(request))
}

route!(update_forwarded_sms_status => Patch "/api/admin/forward-sms/{id}/status" impl LedgerDatabase);
pub async fn update_forwarded_sms_status<B: LedgerDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdate<ForwardedSmsStatus>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ PATCH forwarded SMS #{id} status to {status}");
    let sms = api.update_forwarded_sms_status(id, status).await?;
    Ok(ok_json(sms))
}

route!(withdraw => Post "/api/merchant/withdraw" impl LedgerDatabase);
pub async fn withdraw<B: LedgerDatabase>(
    body: web::Json<WithdrawParams>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (merchant_id, amount, details) = body.into_inner().into_parts().map_err(LedgerError::from)?;
    debug!("💻️ POST withdrawal of {amount} for merchant #{merchant_id} by {}", details.method());
    let withdrawal = api.request_withdrawal(merchant_id, amount, details).await?;
    Ok(ok_json(withdrawal))
}

//----------------------------------------------   Transactions  ----------------------------------------------------
route!(create_payin => Post "/api/admin/payin" impl LedgerDatabase);
pub async fn create_payin<B: LedgerDatabase>(
    body: web::Json<NewPayin>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payin = body.into_inner();
    debug!("💻️ POST payin of {} to {} for merchant #{}", payin.expected_amount, payin.agent_account, payin.merchant_id);
    let payin = api.create_payin(payin).await?;
    Ok(ok_json(payin))
}

route!(create_payout => Post "/api/admin/payout" impl LedgerDatabase);
pub async fn create_payout<B: LedgerDatabase>(
    body: web::Json<NewPayout>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payout = body.into_inner();
    debug!("💻️ POST payout of {} to {} for merchant #{}", payout.request_amount, payout.payee_account, payout.merchant_id);
    let payout = api.create_payout(payout).await?;
    Ok(ok_json(payout))
}

route!(create_payment_request => Post "/api/merchant/merchant-payment-request" impl LedgerDatabase);
pub async fn create_payment_request<B: LedgerDatabase>(
    body: web::Json<NewPaymentRequest>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST payment request of {} for merchant #{}", request.amount, request.merchant_id);
    let request = api.create_payment_request(request).await?;
    Ok(ok_json(request))
}

route!(payin => Get "/api/admin/payin/{id}" impl TransactionStore);
pub async fn payin<B: TransactionStore>(
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payin = api.payin(path.into_inner()).await?;
    Ok(ok_json(payin))
}

route!(payout => Get "/api/admin/payout/{id}" impl TransactionStore);
pub async fn payout<B: TransactionStore>(
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payout = api.payout(path.into_inner()).await?;
    Ok(ok_json(payout))
}

route!(payment_request => Get "/api/merchant/merchant-payment-request/{id}" impl TransactionStore);
pub async fn payment_request<B: TransactionStore>(
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = api.payment_request(path.into_inner()).await?;
    Ok(ok_json(request))
}

route!(forwarded_sms => Get "/api/admin/forward-sms" impl TransactionStore);
pub async fn forwarded_sms<B: TransactionStore>(api: web::Data<HistoryApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET forwarded SMS");
    let sms = api.forwarded_sms().await?;
    Ok(ok_json(sms))
}

route!(withdraw_requests => Get "/api/admin/withdraw-requests" impl TransactionStore);
pub async fn withdraw_requests<B: TransactionStore>(
    query: web::Query<WithdrawQuery>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let status = query.into_inner().status;
    trace!("💻️ GET withdrawal requests with status {status:?}");
    let withdrawals = api.withdrawals(status).await?;
    Ok(ok_json(withdrawals))
}

route!(merchant_transactions => Get "/api/merchant/transactions/{merchant_id}" impl TransactionStore);
pub async fn merchant_transactions<B: TransactionStore>(
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = path.into_inner();
    trace!("💻️ GET transactions for merchant #{merchant_id}");
    let transactions = api.merchant_transactions(merchant_id).await?;
    Ok(ok_json(transactions))
}

//----------------------------------------------   Merchants and agents  ----------------------------------------------
route!(create_merchant => Post "/api/admin/merchant-key" impl MerchantManagement);
pub async fn create_merchant<B: MerchantManagement>(
    body: web::Json<NewMerchant>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant = body.into_inner();
    info!("💻️ Creating merchant {}", merchant.name);
    let merchant = api.create_merchant(merchant).await?;
    Ok(ok_json(merchant))
}

route!(merchant => Get "/api/admin/merchant-key/{id}" impl MerchantManagement);
pub async fn merchant<B: MerchantManagement>(
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant = api.merchant_with_history(path.into_inner()).await?;
    Ok(ok_json(merchant))
}

route!(update_merchant_commissions => Put "/api/admin/merchant-key/{id}/commissions" impl MerchantManagement);
pub async fn update_merchant_commissions<B: MerchantManagement>(
    path: web::Path<i64>,
    body: web::Json<CommissionParams>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let CommissionParams { deposit_commission, withdraw_commission } = body.into_inner();
    info!("💻️ Setting commissions for merchant #{id} to {deposit_commission}% / {withdraw_commission}%");
    let merchant = api.update_merchant_commissions(id, deposit_commission, withdraw_commission).await?;
    Ok(ok_json(merchant))
}

route!(total_gateway_cost => Get "/api/admin/total-getwaycost" impl MerchantManagement);
pub async fn total_gateway_cost<B: MerchantManagement>(
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let total_getwaycost = api.total_gateway_cost().await?;
    Ok(ok_json(TotalGatewayCost { total_getwaycost }))
}

route!(create_agent => Post "/api/admin/agents" impl MerchantManagement);
pub async fn create_agent<B: MerchantManagement>(
    body: web::Json<NewAgent>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let agent = body.into_inner();
    info!("💻️ Creating agent {}", agent.name);
    let agent = api.create_agent(agent).await?;
    Ok(ok_json(agent))
}

route!(update_agent_commissions => Put "/api/admin/users-commissions/{id}" impl MerchantManagement);
pub async fn update_agent_commissions<B: MerchantManagement>(
    path: web::Path<i64>,
    body: web::Json<CommissionParams>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let CommissionParams { deposit_commission, withdraw_commission } = body.into_inner();
    info!("💻️ Setting commissions for agent #{id} to {deposit_commission}% / {withdraw_commission}%");
    let agent = api.update_agent_commissions(id, deposit_commission, withdraw_commission).await?;
    Ok(ok_json(agent))
}

route!(add_agent_account => Post "/api/admin/agents/{id}/accounts" impl MerchantManagement);
pub async fn add_agent_account<B: MerchantManagement>(
    path: web::Path<i64>,
    body: web::Json<NewAgentAccount>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let agent_id = path.into_inner();
    let account = body.into_inner();
    info!("💻️ Registering {} account {} for agent #{agent_id}", account.provider, account.account_number);
    let account = api.add_agent_account(agent_id, account).await?;
    Ok(ok_json(account))
}

route!(agent_accounts => Get "/api/admin/agents/{id}/accounts" impl MerchantManagement);
pub async fn agent_accounts<B: MerchantManagement>(
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let accounts = api.agent_accounts(path.into_inner()).await?;
    Ok(ok_json(accounts))
}
