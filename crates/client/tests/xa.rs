//! XA transactions and the global transaction lifecycle against an
//! in-process coordinator

mod common;

use common::{Bank, DTM, FakeDtm, Reply, Scripted, branch, control};
use dtx_client::{ClientConfig, ClientError, DtxClient, GlobalTransaction, TransactionState};
use dtx_common::{Op, Outcome, TransType, TransactionContext};
use dtx_protocol::TransRequest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const TRANSFER: &str = "http://svc/transfer";

async fn setup() -> (Arc<FakeDtm>, Arc<Bank>, DtxClient) {
    let dtm = FakeDtm::new();
    let bank = Bank::open(dtm.clone(), 100).await;
    dtm.mount(TRANSFER, bank.clone());
    let client = DtxClient::new(dtm.clone());
    (dtm, bank, client)
}

#[tokio::test]
async fn test_xa_success() {
    let (dtm, bank, client) = setup().await;

    let reply = client
        .xa_global_transaction(Some("g1".to_string()), |xa| async move {
            xa.call_branch(TRANSFER, json!({ "amount": -30 })).await
        })
        .await
        .unwrap();

    assert_eq!(reply.outcome, Outcome::Success);
    let body: Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body["result"]["balance"], 70);

    assert_eq!(
        dtm.calls(),
        vec![
            control("prepare", "g1"),
            branch("g1", "01", Op::Action, TRANSFER),
            control("registerBranch", "g1"),
            control("submit", "g1"),
        ]
    );
    let registered = dtm.registered();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].branch_id, "01");
    assert_eq!(registered[0].data["url"], TRANSFER);

    // A redelivered action is answered without running the transfer again
    let again = dtm
        .redeliver("g1", TransType::Xa, "01", Op::Action, TRANSFER, json!({ "amount": -30 }))
        .await
        .unwrap();
    assert_eq!(again.outcome, Outcome::Success);
    assert_eq!(bank.balance().await, 70);
    assert_eq!(bank.runs(), 1);
    assert_eq!(dtm.registered().len(), 1);

    assert_eq!(dtm.drive_phase_two("g1", Op::Commit).await, vec![Outcome::Success]);
    assert_eq!(bank.balance().await, 70);
}

#[tokio::test]
async fn test_xa_callback_failure_aborts() {
    let (dtm, bank, client) = setup().await;

    let result = client
        .xa_global_transaction(Some("g1".to_string()), |xa| async move {
            xa.call_branch(TRANSFER, json!({ "amount": -30 })).await?;
            Err::<(), _>(ClientError::Business("fraud check failed".to_string()))
        })
        .await;

    assert!(matches!(result, Err(ClientError::Business(_))));
    assert_eq!(
        dtm.calls(),
        vec![
            control("prepare", "g1"),
            branch("g1", "01", Op::Action, TRANSFER),
            control("registerBranch", "g1"),
            control("abort", "g1"),
        ]
    );

    // Local work stays until the coordinator rolls the branch back
    assert_eq!(bank.balance().await, 70);
    assert_eq!(dtm.drive_phase_two("g1", Op::Rollback).await, vec![Outcome::Success]);
    assert_eq!(bank.balance().await, 100);

    // Redelivered rollback is a no-op
    dtm.drive_phase_two("g1", Op::Rollback).await;
    assert_eq!(bank.balance().await, 100);
}

#[tokio::test]
async fn test_branch_failure_aborts() {
    let (dtm, bank, client) = setup().await;

    let result = client
        .xa_global_transaction(Some("g1".to_string()), |xa| async move {
            xa.call_branch(TRANSFER, json!({ "amount": -500 })).await
        })
        .await;

    match result {
        Err(ClientError::Failure(message)) => assert!(message.contains("insufficient balance")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(dtm.count("abort"), 1);
    assert_eq!(dtm.count("registerBranch"), 0);
    assert_eq!(bank.balance().await, 100);
    assert!(bank.records("g1").await.is_empty());
}

#[tokio::test]
async fn test_rollback_before_action() {
    let (dtm, bank, _client) = setup().await;

    let rollback = dtm
        .redeliver("g1", TransType::Xa, "01", Op::Rollback, TRANSFER, Value::Null)
        .await
        .unwrap();
    assert_eq!(rollback.outcome, Outcome::Success);

    let late = dtm
        .redeliver("g1", TransType::Xa, "01", Op::Action, TRANSFER, json!({ "amount": -30 }))
        .await
        .unwrap();
    assert_eq!(late.outcome, Outcome::Success);

    assert_eq!(bank.balance().await, 100);
    assert_eq!(bank.runs(), 0);
    // A suspended branch never registers for phase 2
    assert!(dtm.registered().is_empty());
}

#[tokio::test]
async fn test_compensation_before_action() {
    let (dtm, bank, _client) = setup().await;

    dtm.redeliver("g1", TransType::Saga, "01", Op::Compensate, TRANSFER, json!({ "amount": -30 }))
        .await
        .unwrap();
    assert_eq!(bank.balance().await, 100);

    dtm.redeliver("g1", TransType::Saga, "01", Op::Action, TRANSFER, json!({ "amount": -30 }))
        .await
        .unwrap();
    assert_eq!(bank.balance().await, 100);
    assert_eq!(bank.runs(), 0);

    let records = bank.records("g1").await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.reason == Op::Compensate));
}

#[tokio::test]
async fn test_abort_error_keeps_callback_error() {
    let (dtm, _bank, client) = setup().await;
    dtm.reply_with("abort", Reply::Error("coordinator down".to_string()));

    let result = client
        .xa_global_transaction(Some("g1".to_string()), |_xa| async move {
            Err::<(), _>(ClientError::Business("fraud check failed".to_string()))
        })
        .await;

    match result {
        Err(ClientError::Business(message)) => assert_eq!(message, "fraud check failed"),
        other => panic!("expected the callback error, got {:?}", other),
    }
    assert_eq!(dtm.count("abort"), 1);
}

#[tokio::test]
async fn test_ongoing_leaves_transaction_prepared() {
    let dtm = FakeDtm::new();
    let global = GlobalTransaction::new(dtm.clone(), TransRequest::new("g1", TransType::Xa), None);

    let result = global
        .run(|| async { Err::<(), _>(ClientError::Ongoing("still settling".to_string())) })
        .await;

    assert!(result.unwrap_err().is_ongoing());
    assert_eq!(global.state(), TransactionState::Prepared);
    assert_eq!(dtm.calls(), vec![control("prepare", "g1")]);
}

#[tokio::test]
async fn test_ongoing_branch_is_not_aborted() {
    let (dtm, _bank, client) = setup().await;
    dtm.mount("http://svc/busy", Scripted::new(Outcome::Ongoing));

    let result = client
        .xa_global_transaction(Some("g1".to_string()), |xa| async move {
            xa.call_branch("http://svc/busy", json!({})).await
        })
        .await;

    assert!(result.unwrap_err().is_ongoing());
    assert_eq!(dtm.count("abort"), 0);
    assert_eq!(dtm.count("submit"), 0);
}

#[tokio::test]
async fn test_ongoing_submit_is_not_aborted() {
    let dtm = FakeDtm::new();
    dtm.reply_with("submit", Reply::Outcome(Outcome::Ongoing));
    let global = GlobalTransaction::new(dtm.clone(), TransRequest::new("g1", TransType::Xa), None);

    let result = global.run(|| async { Ok(()) }).await;

    assert!(result.unwrap_err().is_ongoing());
    assert_eq!(global.state(), TransactionState::Prepared);
    assert_eq!(dtm.count("abort"), 0);
}

#[tokio::test]
async fn test_prepare_failure_skips_callback() {
    let dtm = FakeDtm::new();
    dtm.reply_with("prepare", Reply::Outcome(Outcome::Failure));
    let client = DtxClient::new(dtm.clone());
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    let result = client
        .xa_global_transaction(Some("g1".to_string()), |_xa| async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(ClientError::Failure(_))));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(dtm.calls(), vec![control("prepare", "g1")]);
}

#[tokio::test]
async fn test_callback_timeout_aborts() {
    let dtm = FakeDtm::new();
    let config = ClientConfig::default().with_callback_timeout(Duration::from_millis(50));
    let client = DtxClient::with_config(dtm.clone(), config);

    let result = client
        .xa_global_transaction(Some("g1".to_string()), |_xa| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(ClientError::Timeout(_))));
    assert_eq!(dtm.count("abort"), 1);
}

#[tokio::test]
async fn test_context_is_scoped_to_callback() {
    let dtm = FakeDtm::new();
    let client = DtxClient::new(dtm.clone());

    let gid = client
        .xa_global_transaction(None, |xa| async move {
            let ctx = TransactionContext::current()?;
            assert_eq!(ctx.gid(), xa.gid());
            assert_eq!(ctx.trans_type(), TransType::Xa);
            assert_eq!(ctx.dtm(), DTM);
            Ok(ctx.gid().to_string())
        })
        .await
        .unwrap();

    assert_eq!(gid, "gid-1");
    assert!(TransactionContext::try_current().is_none());
}

#[tokio::test]
async fn test_context_is_visible_before_first_await() {
    let dtm = FakeDtm::new();
    let global = GlobalTransaction::new(dtm.clone(), TransRequest::new("g1", TransType::Xa), None);

    let gid = global
        .run(|| {
            let ctx = TransactionContext::current();
            async move { Ok(ctx?.gid().to_string()) }
        })
        .await
        .unwrap();

    assert_eq!(gid, "g1");
    assert_eq!(global.state(), TransactionState::Submitted);
}

#[tokio::test]
async fn test_state_transitions() {
    let dtm = FakeDtm::new();
    let global = GlobalTransaction::new(dtm.clone(), TransRequest::new("g1", TransType::Tcc), None);
    assert_eq!(global.state(), TransactionState::Created);

    global.prepare().await.unwrap();
    assert!(matches!(
        global.prepare().await,
        Err(ClientError::InvalidState(_))
    ));

    global.abort().await.unwrap();
    global.abort().await.unwrap();
    assert_eq!(global.state(), TransactionState::Aborted);
    assert_eq!(dtm.count("abort"), 1);

    assert!(matches!(
        global.submit().await,
        Err(ClientError::InvalidState(_))
    ));
}
