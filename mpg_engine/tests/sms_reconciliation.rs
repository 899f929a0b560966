mod support;

use log::*;
use mpg_engine::{
    db_types::{ForwardedSmsStatus, NewPayin, NewPayout, Paisa, PayinStatus, PayoutStatus, Provider, TransactionRef},
    helpers::SmsParser,
    LedgerError,
    MatchWindow,
    MerchantManagement,
    ReconciliationApi,
    SettlementApi,
    SettlementConfig,
    SmsForward,
    SmsOutcome,
    SqliteDatabase,
    TransactionStore,
};
use support::*;
use tokio::runtime::Runtime;

fn reconciliation(db: &SqliteDatabase) -> ReconciliationApi<SqliteDatabase> {
    // The SMS in these tests are from 2024, so the window must not depend on the current date
    ReconciliationApi::new(db.clone(), SmsParser::default(), MatchWindow::unbounded())
}

fn forward(provider: &str, text: &str) -> SmsForward {
    SmsForward {
        provider: provider.into(),
        number: None,
        text: text.into(),
        sent_stamp: Some("1717214400000".into()),
        received_stamp: Some("1717214401000".into()),
    }
}

#[test]
fn matched_sms_settles_payin() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        let (agent, account) = agent(&db, AGENT_NUMBER).await;
        let payin = NewPayin::new(merchant.id, AGENT_NUMBER, Paisa::from_taka(500), Provider::Bkash);
        let payin = db.create_payin(payin).await.unwrap();
        assert_eq!(payin.status, PayinStatus::Pending);

        let outcome = reconciliation(&db).process_sms(forward("bkash", SCENARIO_SMS)).await.unwrap();
        let settled = match outcome {
            SmsOutcome::PayinSettled { payin } => payin,
            other => panic!("Expected the payin to settle, got {other:?}"),
        };
        assert_eq!(settled.id, payin.id);
        assert_eq!(settled.status, PayinStatus::Completed);
        assert_eq!(settled.transaction_id.as_deref(), Some("XYZ1"));
        assert_eq!(settled.payer_account.as_deref(), Some(CUSTOMER_NUMBER));
        assert_eq!(settled.received_amount, Some(Paisa::from_taka(500)));

        // 2% of Tk 500 is Tk 10
        let merchant = db.fetch_merchant(merchant.id).await.unwrap().unwrap();
        assert_eq!(merchant.balance, Paisa::from_taka(490));
        assert_eq!(merchant.getwaycost, Paisa::from_taka(10));
        assert_eq!(merchant.total_payin, Paisa::from_taka(500));
        let history = db.fetch_gateway_cost_history(merchant.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, Paisa::from_taka(10));

        // The agent holds the customer's Tk 500 and keeps 1% of it
        let agent = db.fetch_agent(agent.id).await.unwrap().unwrap();
        assert_eq!(agent.balance, Paisa::from_taka(-495));
        assert_eq!(agent.providercost, Paisa::from_taka(5));
        assert_eq!(agent.totalpayment, Paisa::from_taka(500));
        let account = db.resolve_agent_account(&account.account_number).await.unwrap().unwrap();
        assert_eq!(account.total_order, 1);
        assert_eq!(account.total_received, Paisa::from_taka(500));
        info!("🚀️ Payin settled from SMS");
        shutdown(db).await;
    });
}

#[test]
fn unmatched_sms_is_kept_for_review() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        let _ = agent(&db, AGENT_NUMBER).await;
        let api = reconciliation(&db);

        let outcome = api.process_sms(forward("bkash", SCENARIO_SMS)).await.unwrap();
        let sms = match outcome {
            SmsOutcome::Unmatched { forwarded_sms } => forwarded_sms,
            other => panic!("Expected no match, got {other:?}"),
        };
        assert_eq!(sms.status, ForwardedSmsStatus::Arrived);
        assert_eq!(sms.provider, "bkash");
        assert_eq!(sms.transaction_id.as_deref(), Some("XYZ1"));
        assert_eq!(sms.amount, Some(Paisa::from_taka(500)));
        assert!(sms.failure_reason.is_none());
        assert_eq!(balance(&db, merchant.id).await, Paisa::default());
        assert_eq!(db.fetch_total_gateway_cost().await.unwrap(), Paisa::default());

        // Forwarding the same SMS again does not create a second record
        let again = api.process_sms(forward("bkash", SCENARIO_SMS)).await.unwrap();
        assert!(matches!(again, SmsOutcome::Unmatched { forwarded_sms } if forwarded_sms.id == sms.id));
        assert_eq!(db.fetch_all_forwarded_sms().await.unwrap().len(), 1);
        shutdown(db).await;
    });
}

#[test]
fn duplicate_sms_does_not_settle_twice() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        let _ = agent(&db, AGENT_NUMBER).await;
        let first = NewPayin::new(merchant.id, AGENT_NUMBER, Paisa::from_taka(500), Provider::Bkash);
        let first = db.create_payin(first).await.unwrap();
        let second = NewPayin::new(merchant.id, AGENT_NUMBER, Paisa::from_taka(500), Provider::Bkash);
        let second = db.create_payin(second).await.unwrap();
        let api = reconciliation(&db);

        let outcome = api.process_sms(forward("bkash", SCENARIO_SMS)).await.unwrap();
        assert!(matches!(outcome, SmsOutcome::PayinSettled { payin } if payin.id == first.id));
        let outcome = api.process_sms(forward("bkash", SCENARIO_SMS)).await.unwrap();
        match outcome {
            SmsOutcome::AlreadyProcessed { transaction } => assert_eq!(transaction, TransactionRef::Payin(first.id)),
            other => panic!("Expected a duplicate, got {other:?}"),
        }
        assert_eq!(balance(&db, merchant.id).await, Paisa::from_taka(490));
        let second = db.fetch_payin(second.id).await.unwrap().unwrap();
        assert_eq!(second.status, PayinStatus::Pending);
        shutdown(db).await;
    });
}

#[test]
fn unreadable_sms_needs_review() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let api = reconciliation(&db);

        let outcome = api.process_sms(forward("bkash", "Your OTP is 123456")).await.unwrap();
        match outcome {
            SmsOutcome::NeedsReview { forwarded_sms, .. } => {
                assert_eq!(forwarded_sms.failure_reason.as_deref(), Some("unrecognized-format"));
                assert_eq!(forwarded_sms.status, ForwardedSmsStatus::Arrived);
                assert!(forwarded_sms.transaction_id.is_none());
            },
            other => panic!("Expected review, got {other:?}"),
        }
        let outcome = api.process_sms(forward("rocket", SCENARIO_SMS)).await.unwrap();
        match outcome {
            SmsOutcome::NeedsReview { forwarded_sms, .. } => {
                assert_eq!(forwarded_sms.failure_reason.as_deref(), Some("unknown-provider"));
                assert_eq!(forwarded_sms.provider, "rocket");
            },
            other => panic!("Expected review, got {other:?}"),
        }
        assert_eq!(db.fetch_all_forwarded_sms().await.unwrap().len(), 2);
        shutdown(db).await;
    });
}

#[test]
fn matched_sms_settles_payout() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        let (agent, _) = agent(&db, AGENT_NUMBER).await;
        fund_merchant(&db, merchant.id, Paisa::from_taka(5_000)).await;
        let payout = NewPayout {
            merchant_id: merchant.id,
            agent_account: AGENT_NUMBER.into(),
            payee_account: "01911111111".into(),
            request_amount: Paisa::from_taka(1_000),
            provider: Provider::Bkash,
        };
        let payout = db.create_payout(payout).await.unwrap();

        let text = "Cash In Tk 1,000 from 01712345678 to 01911111111. Fee Tk 0. Balance Tk 8500. TrxID PAY1 at \
                    01/06/2024 11:00";
        let mut sms = forward("bkash", text);
        sms.number = Some(AGENT_NUMBER.into());
        let outcome = reconciliation(&db).process_sms(sms).await.unwrap();
        let settled = match outcome {
            SmsOutcome::PayoutSettled { payout } => payout,
            other => panic!("Expected the payout to settle, got {other:?}"),
        };
        assert_eq!(settled.id, payout.id);
        assert_eq!(settled.status, PayoutStatus::Success);
        assert_eq!(settled.sent_amount, Some(Paisa::from_taka(1_000)));

        // 1% merchant withdraw commission, 0.5% agent withdraw commission
        let merchant = db.fetch_merchant(merchant.id).await.unwrap().unwrap();
        assert_eq!(merchant.balance, Paisa::from_taka(5_000 - 1_010));
        assert_eq!(merchant.getwaycost, Paisa::from_taka(10));
        assert_eq!(merchant.total_payout, Paisa::from_taka(1_000));
        let agent = db.fetch_agent(agent.id).await.unwrap().unwrap();
        assert_eq!(agent.balance, Paisa::from_taka(995));
        assert_eq!(agent.providercost, Paisa::from_taka(5));
        shutdown(db).await;
    });
}

#[test]
fn admin_settlement_follows_lifecycle() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        let _ = agent(&db, AGENT_NUMBER).await;
        let api = SettlementApi::new(db.clone(), SettlementConfig::default());
        let payin = NewPayin::new(merchant.id, AGENT_NUMBER, Paisa::from_taka(1_000), Provider::Bkash);
        let payin = api.create_payin(payin).await.unwrap();

        let done = api.update_payin_status(payin.id, PayinStatus::Completed, Some("admin".into())).await.unwrap();
        assert_eq!(done.status, PayinStatus::Completed);
        assert_eq!(done.update_by.as_deref(), Some("admin"));
        assert_eq!(balance(&db, merchant.id).await, Paisa::from_taka(980));

        // Asking again changes nothing
        let again = api.update_payin_status(payin.id, PayinStatus::Completed, None).await.unwrap();
        assert_eq!(again, done);
        assert_eq!(balance(&db, merchant.id).await, Paisa::from_taka(980));

        let err = api.update_payin_status(payin.id, PayinStatus::Rejected, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition(_)));
        assert_eq!(db.fetch_gateway_cost_history(merchant.id).await.unwrap().len(), 1);

        let expired = NewPayin::new(merchant.id, AGENT_NUMBER, Paisa::from_taka(700), Provider::Bkash);
        let expired = api.create_payin(expired).await.unwrap();
        let expired = api.update_payin_status(expired.id, PayinStatus::Expired, None).await.unwrap();
        assert_eq!(expired.status, PayinStatus::Expired);
        assert_eq!(balance(&db, merchant.id).await, Paisa::from_taka(980));

        let err = api.update_payin_status(9999, PayinStatus::Completed, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::TransactionNotFound(_)));
        shutdown(db).await;
    });
}

#[test]
fn payins_need_a_registered_account() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        let payin = NewPayin::new(merchant.id, "01000000000", Paisa::from_taka(500), Provider::Bkash);
        let err = db.create_payin(payin).await.unwrap_err();
        assert!(matches!(err, LedgerError::AgentAccountNotFound(_)));
        let payin = NewPayin::new(merchant.id + 1, AGENT_NUMBER, Paisa::from_taka(500), Provider::Bkash);
        let err = db.create_payin(payin).await.unwrap_err();
        assert_eq!(err, LedgerError::MerchantNotFound(merchant.id + 1));
        shutdown(db).await;
    });
}

/// If the ledger cannot be written after the payin is marked completed, the whole settlement is rolled back.
#[test]
fn failed_ledger_write_rolls_back_settlement() {
    Runtime::new().unwrap().block_on(async {
        let db = new_database().await;
        let merchant = merchant(&db).await;
        agent(&db, AGENT_NUMBER).await;
        let payin = NewPayin::new(merchant.id, AGENT_NUMBER, Paisa::from_taka(500), Provider::Bkash);
        let payin = db.create_payin(payin).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER agents_locked BEFORE UPDATE ON agents BEGIN SELECT RAISE(ABORT, 'agent ledger locked'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = reconciliation(&db).process_sms(forward("bkash", SCENARIO_SMS)).await.unwrap_err();
        assert!(matches!(err, LedgerError::DatabaseError(_)), "Unexpected error: {err:?}");

        let payin = db.fetch_payin(payin.id).await.unwrap().unwrap();
        assert_eq!(payin.status, PayinStatus::Pending);
        assert!(payin.transaction_id.is_none());
        let merchant = db.fetch_merchant(merchant.id).await.unwrap().unwrap();
        assert_eq!(merchant.balance, Paisa::from(0));
        assert_eq!(merchant.getwaycost, Paisa::from(0));
        assert!(db.fetch_gateway_cost_history(merchant.id).await.unwrap().is_empty());
        shutdown(db).await;
    });
}
