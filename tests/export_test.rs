mod common;

use std::fs::File;

use anyhow::Result;
use common::{StandardAccounts, service_at, test_service, transfer};
use ledgerline::io::Exporter;
use serde_json::Value;

const PAYER: &str = StandardAccounts::PAYER;
const PAYEE: &str = StandardAccounts::PAYEE;

#[tokio::test]
async fn test_export_transactions_csv() -> Result<()> {
    let (service, temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    service_at(&service, "2025-01-01 09:00:00")
        .transfer(&transfer(PAYER, PAYEE, 200))
        .await?;
    service_at(&service, "2025-01-02 09:00:00")
        .transfer(&transfer(PAYEE, PAYER, 50))
        .await?;

    let path = temp.path().join("ledger.csv");
    let exporter = Exporter::new(&service);
    let count = exporter
        .export_transactions_csv(File::create(&path)?, None)
        .await?;
    assert_eq!(count, 4);

    let mut reader = csv::Reader::from_path(&path)?;
    let headers = reader.headers()?.clone();
    assert_eq!(&headers[0], "transaction_id");
    assert_eq!(&headers[10], "transferred_at");

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 4);
    // Newest first.
    assert_eq!(&rows[0][10], "2025-01-02 09:00:00");
    assert_eq!(&rows[3][10], "2025-01-01 09:00:00");
    let amounts: i64 = rows.iter().map(|r| r[7].parse::<i64>().unwrap()).sum();
    assert_eq!(amounts, 0);

    let statement = temp.path().join("statement.csv");
    let count = exporter
        .export_transactions_csv(File::create(&statement)?, Some(PAYER))
        .await?;
    assert_eq!(count, 2);
    let mut reader = csv::Reader::from_path(&statement)?;
    for row in reader.records() {
        assert_eq!(&row?[1], PAYER);
    }
    Ok(())
}

#[tokio::test]
async fn test_export_balances_csv() -> Result<()> {
    let (service, temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    service.transfer(&transfer(PAYER, PAYEE, 200)).await?;

    let path = temp.path().join("balances.csv");
    let count = Exporter::new(&service)
        .export_balances_csv(File::create(&path)?)
        .await?;
    assert_eq!(count, 2);

    let mut reader = csv::Reader::from_path(&path)?;
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(&rows[0][0], PAYER);
    assert_eq!(&rows[0][5], "800");
    assert_eq!(&rows[0][6], "800");
    assert_eq!(&rows[1][0], PAYEE);
    assert_eq!(&rows[1][5], "700");
    Ok(())
}

#[tokio::test]
async fn test_export_full_json() -> Result<()> {
    let (service, temp) = test_service().await?;
    StandardAccounts::open(&service).await?;
    service.transfer(&transfer(PAYER, PAYEE, 200)).await?;

    let path = temp.path().join("ledger.json");
    let snapshot = Exporter::new(&service)
        .export_full_json(File::create(&path)?)
        .await?;
    assert_eq!(snapshot.accounts.len(), 2);
    assert_eq!(snapshot.transactions.len(), 2);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(written["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(written["accounts"][0]["number"], PAYER);
    assert_eq!(written["accounts"][0]["currentBalance"], 800);
    assert_eq!(written["transactions"].as_array().map(Vec::len), Some(2));
    Ok(())
}
