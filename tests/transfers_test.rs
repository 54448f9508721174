mod common;

use anyhow::Result;
use common::{StandardAccounts, balance_of, service_at, test_service, transfer};
use ledgerline::application::{AppError, TransferStatus};
use ledgerline::domain::{Account, LegType, check_ledger_pairs, format_timestamp};

const PAYER: &str = StandardAccounts::PAYER;
const PAYEE: &str = StandardAccounts::PAYEE;

#[tokio::test]
async fn test_transfer_moves_both_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;

    let result = service.transfer(&transfer(PAYER, PAYEE, 200)).await?;

    assert_eq!(result.status, TransferStatus::Transferred);
    assert!(result.transaction_id.starts_with("TXN"));
    assert!(!result.replayed);

    let payer = service.get_balance(PAYER).await?;
    assert_eq!(payer.balance, 800);
    assert_eq!(payer.available_balance, 800);
    let payee = service.get_balance(PAYEE).await?;
    assert_eq!(payee.balance, 700);
    assert_eq!(payee.available_balance, 700);
    Ok(())
}

#[tokio::test]
async fn test_transfer_writes_paired_legs() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    let service = service_at(&service, "2025-01-02 13:00:00");

    let result = service.transfer(&transfer(PAYER, PAYEE, 200)).await?;
    assert_eq!(format_timestamp(result.transferred_at), "2025-01-02 13:00:00");

    let payer_legs = service.list_transactions(PAYER).await?;
    assert_eq!(payer_legs.len(), 1);
    assert_eq!(payer_legs[0].leg_type, LegType::TransferOut);
    assert_eq!(payer_legs[0].amount, -200);
    assert_eq!(payer_legs[0].to_account_name, "Jane Doe");
    assert_eq!(payer_legs[0].transferred_at, result.transferred_at);

    let payee_legs = service.list_transactions(PAYEE).await?;
    assert_eq!(payee_legs.len(), 1);
    assert_eq!(payee_legs[0].leg_type, LegType::TransferIn);
    assert_eq!(payee_legs[0].amount, 200);
    assert_eq!(payee_legs[0].transaction_id, result.transaction_id);

    assert!(check_ledger_pairs(&service.list_all_transactions().await?).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_insufficient_balance_changes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;

    let err = service.transfer(&transfer(PAYER, PAYEE, 2000)).await.unwrap_err();

    assert!(matches!(err, AppError::InsufficientBalance { .. }));
    assert_eq!(err.to_string(), "insufficient balance");
    assert_eq!(balance_of(&service, PAYER).await?, 1000);
    assert_eq!(balance_of(&service, PAYEE).await?, 500);
    assert!(service.list_all_transactions().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_exact_balance_can_be_spent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;

    service.transfer(&transfer(PAYER, PAYEE, 1000)).await?;

    assert_eq!(balance_of(&service, PAYER).await?, 0);
    let err = service.transfer(&transfer(PAYER, PAYEE, 1)).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));
    Ok(())
}

#[tokio::test]
async fn test_validation_failures() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;

    let mut zero = transfer(PAYER, PAYEE, 0);
    assert!(matches!(service.transfer(&zero).await, Err(AppError::Validation(_))));
    zero.amount = -10;
    assert!(matches!(service.transfer(&zero).await, Err(AppError::Validation(_))));

    let mut no_bank = transfer(PAYER, PAYEE, 10);
    no_bank.to_bank = String::new();
    assert!(matches!(service.transfer(&no_bank).await, Err(AppError::Validation(_))));

    let to_self = transfer(PAYER, PAYER, 10);
    assert!(matches!(service.transfer(&to_self).await, Err(AppError::Validation(_))));

    let mut wrong_currency = transfer(PAYER, PAYEE, 10);
    wrong_currency.currency = "THB".to_string();
    let err = service.transfer(&wrong_currency).await.unwrap_err();
    assert_eq!(err.to_string(), "currency mismatch");

    assert_eq!(balance_of(&service, PAYER).await?, 1000);
    Ok(())
}

#[tokio::test]
async fn test_unknown_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;

    match service.transfer(&transfer("00000", PAYEE, 10)).await {
        Err(AppError::AccountNotFound(number)) => assert_eq!(number, "00000"),
        other => panic!("expected AccountNotFound, got {:?}", other),
    }
    match service.transfer(&transfer(PAYER, "99999", 10)).await {
        Err(AppError::AccountNotFound(number)) => assert_eq!(number, "99999"),
        other => panic!("expected AccountNotFound, got {:?}", other),
    }
    assert_eq!(balance_of(&service, PAYER).await?, 1000);
    Ok(())
}

#[tokio::test]
async fn test_balances_equal_initial_plus_applied_movements() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    service
        .open_account(&Account::new("77777", "Third Party", "USD", 0))
        .await?;

    let movements = [
        (PAYER, PAYEE, 300),
        (PAYEE, "77777", 650),
        ("77777", PAYER, 125),
        (PAYER, "77777", 5000), // rejected
        (PAYEE, PAYER, 150),
    ];
    for (from, to, amount) in movements {
        let _ = service.transfer(&transfer(from, to, amount)).await;
    }

    assert_eq!(balance_of(&service, PAYER).await?, 1000 - 300 + 125 + 150);
    assert_eq!(balance_of(&service, PAYEE).await?, 500 + 300 - 650 - 150);
    assert_eq!(balance_of(&service, "77777").await?, 650 - 125);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.transaction_count, 4);
    assert_eq!(report.entry_count, 8);
    assert_eq!(report.total_balance, 1500);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_overspend_admits_only_what_balance_allows() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.transfer(&transfer(PAYER, PAYEE, 200)).await
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => admitted += 1,
            Err(AppError::InsufficientBalance { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted, 5);
    assert_eq!(rejected, 5);
    assert_eq!(balance_of(&service, PAYER).await?, 0);
    assert_eq!(balance_of(&service, PAYEE).await?, 1500);
    assert_eq!(service.list_transactions(PAYER).await?.len(), 5);
    assert!(service.check_integrity().await?.is_healthy());
    Ok(())
}

#[tokio::test]
async fn test_retry_with_same_id_applies_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    let request = transfer(PAYER, PAYEE, 200);
    let id = service.next_transaction_id();

    let first = service.transfer_with_id(&id, &request).await?;
    let second = service.transfer_with_id(&id, &request).await?;

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(first.transferred_at, second.transferred_at);
    assert_eq!(balance_of(&service, PAYER).await?, 800);
    assert_eq!(balance_of(&service, PAYEE).await?, 700);
    assert_eq!(service.list_all_transactions().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_retry_after_aborted_attempt_applies_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    let request = transfer(PAYER, PAYEE, 1200);
    let id = service.next_transaction_id();

    // Not enough money yet; nothing is written under the id.
    assert!(service.transfer_with_id(&id, &request).await.is_err());
    assert!(service.list_all_transactions().await?.is_empty());

    service.transfer(&transfer(PAYEE, PAYER, 300)).await?;
    service.transfer_with_id(&id, &request).await?;
    service.transfer_with_id(&id, &request).await?;

    assert_eq!(balance_of(&service, PAYER).await?, 1000 + 300 - 1200);
    assert_eq!(balance_of(&service, PAYEE).await?, 500 - 300 + 1200);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_retries_with_same_id_apply_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    let id = service.next_transaction_id();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = service.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            service
                .transfer_with_id(&id, &transfer(PAYER, PAYEE, 200))
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        let result = handle.await??;
        assert_eq!(result.transaction_id, id);
        if !result.replayed {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(balance_of(&service, PAYER).await?, 800);
    assert_eq!(service.list_all_transactions().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_reusing_id_for_different_transfer_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    let id = service.next_transaction_id();

    service.transfer_with_id(&id, &transfer(PAYER, PAYEE, 200)).await?;
    let err = service
        .transfer_with_id(&id, &transfer(PAYER, PAYEE, 300))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(balance_of(&service, PAYER).await?, 800);
    Ok(())
}

#[tokio::test]
async fn test_reusing_id_with_other_bank_or_note_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    let id = service.next_transaction_id();
    service.transfer_with_id(&id, &transfer(PAYER, PAYEE, 200)).await?;

    let mut other_bank = transfer(PAYER, PAYEE, 200);
    other_bank.to_bank = "SCB".to_string();
    let err = service.transfer_with_id(&id, &other_bank).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut other_note = transfer(PAYER, PAYEE, 200);
    other_note.note = "rent".to_string();
    let err = service.transfer_with_id(&id, &other_note).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(balance_of(&service, PAYER).await?, 800);
    assert_eq!(service.list_all_transactions().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_credit_past_max_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .open_account(&Account::new("A", "Small", "USD", 10))
        .await?;
    service
        .open_account(&Account::new("B", "Huge", "USD", i64::MAX - 5))
        .await?;

    let err = service.transfer(&transfer("A", "B", 10)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Both rows still decode and nothing moved.
    assert_eq!(balance_of(&service, "A").await?, 10);
    assert_eq!(balance_of(&service, "B").await?, i64::MAX - 5);
    assert!(service.list_all_transactions().await?.is_empty());

    // A credit that fits exactly is still admitted.
    service.transfer(&transfer("A", "B", 5)).await?;
    assert_eq!(balance_of(&service, "B").await?, i64::MAX);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.total_balance, i128::from(i64::MAX) + 5);
    assert_eq!(service.list_accounts().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_open_account_checks_opening_figures() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let negative = Account::new("A", "Neg", "USD", -1);
    assert!(matches!(
        service.open_account(&negative).await.unwrap_err(),
        AppError::Validation(_)
    ));

    let mut inconsistent = Account::new("B", "Odd", "USD", 100);
    inconsistent.available_balance = 150;
    assert!(matches!(
        service.open_account(&inconsistent).await.unwrap_err(),
        AppError::Validation(_)
    ));

    assert!(service.list_accounts().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_ledger_rows_cannot_be_rewritten() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    service.transfer(&transfer(PAYER, PAYEE, 200)).await?;

    let pool = service.database().pool();
    let update = sqlx::query("UPDATE ledger_entries SET amount = 0")
        .execute(pool)
        .await;
    assert!(update.is_err());
    let delete = sqlx::query("DELETE FROM ledger_entries").execute(pool).await;
    assert!(delete.is_err());

    assert_eq!(service.list_all_transactions().await?.len(), 2);
    Ok(())
}
