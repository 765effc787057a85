//! The file-backed client through the `BudgetClient` interface

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;

use envelope_api::client::types::*;
use envelope_api::client::{BudgetClient, Connector, LocalConnector};
use envelope_api::config::ClientConfig;
use envelope_api::models::MonthKey;

async fn client() -> (TempDir, Arc<dyn BudgetClient>) {
    let temp_dir = TempDir::new().unwrap();
    let client = LocalConnector
        .connect(&ClientConfig::local(temp_dir.path()))
        .await
        .unwrap();
    client.create_budget("Household").await.unwrap();
    (temp_dir, client)
}

async fn account(client: &dyn BudgetClient, name: &str, offbudget: bool, balance: i64) -> String {
    client
        .create_account(
            NewAccount {
                name: name.to_string(),
                offbudget,
            },
            balance,
        )
        .await
        .unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
}

fn month() -> MonthKey {
    MonthKey::new(2025, 4).unwrap()
}

async fn category_named(client: &dyn BudgetClient, income: bool) -> Category {
    client
        .get_categories()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.is_income == income)
        .unwrap()
}

#[tokio::test]
async fn test_transfer_creates_mirror() {
    let (_temp_dir, client) = client().await;
    let checking = account(client.as_ref(), "Checking", false, 50_000).await;
    let savings = account(client.as_ref(), "Savings", false, 0).await;

    let transfer_payee = client
        .get_payees()
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.transfer_acct.as_deref() == Some(savings.as_str()))
        .unwrap();

    let mut txn = NewTransaction::new(date(2), -20_000);
    txn.payee = Some(transfer_payee.id);
    let ids = client
        .add_transactions(
            &checking,
            vec![txn],
            AddOptions {
                learn_categories: false,
                run_transfers: true,
            },
        )
        .await
        .unwrap();

    let mirrored = client.get_transactions(&savings, date(1), date(30)).await.unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].amount, 20_000);
    assert_eq!(mirrored[0].transfer_id.as_deref(), Some(ids[0].as_str()));

    assert_eq!(client.get_account_balance(&checking, None).await.unwrap(), 30_000);
    assert_eq!(client.get_account_balance(&savings, None).await.unwrap(), 20_000);

    // Removing one side removes the other
    client.delete_transaction(&ids[0]).await.unwrap();
    assert!(client.get_transactions(&savings, date(1), date(30)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_import_deduplicates() {
    let (_temp_dir, client) = client().await;
    let checking = account(client.as_ref(), "Checking", false, 0).await;

    let rows = || {
        let mut a = NewTransaction::new(date(3), -1_500);
        a.imported_id = Some("bank-001".into());
        a.payee_name = Some("Cafe".into());
        let mut b = NewTransaction::new(date(4), -8_000);
        b.payee_name = Some("Grocer".into());
        vec![a, b]
    };

    let first = client.import_transactions(&checking, rows()).await.unwrap();
    assert_eq!(first.added.len(), 2);
    assert!(first.errors.is_empty());

    let second = client.import_transactions(&checking, rows()).await.unwrap();
    assert!(second.added.is_empty());
    assert_eq!(second.updated.len(), 2);
    assert_eq!(client.get_transactions(&checking, date(1), date(30)).await.unwrap().len(), 2);

    let mut bad = NewTransaction::new(date(5), -100);
    bad.category = Some("not-a-category".into());
    let result = client.import_transactions(&checking, vec![bad]).await.unwrap();
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_rules_follow_merged_payees() {
    let (_temp_dir, client) = client().await;
    let keep = client
        .create_payee(NewPayee {
            name: "Corner Shop".into(),
            category: None,
        })
        .await
        .unwrap();
    let dupe = client
        .create_payee(NewPayee {
            name: "CORNER SHOP #12".into(),
            category: None,
        })
        .await
        .unwrap();

    let rule: NewRule = serde_json::from_value(json!({
        "conditions": [{"field": "payee", "op": "is", "value": dupe}],
        "actions": [{"field": "notes", "value": "snacks"}]
    }))
    .unwrap();
    let created = client.create_rule(rule).await.unwrap();
    assert_eq!(client.get_payee_rules(&dupe).await.unwrap().len(), 1);

    client.merge_payees(&keep, &[dupe.clone()]).await.unwrap();

    let rules = client.get_payee_rules(&keep).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, created.id);
    assert!(client.get_payees().await.unwrap().iter().all(|p| p.id != dupe));
}

#[tokio::test]
async fn test_category_delete_moves_transactions() {
    let (_temp_dir, client) = client().await;
    let checking = account(client.as_ref(), "Checking", false, 0).await;
    let target = category_named(client.as_ref(), false).await;

    let doomed = client
        .create_category(NewCategory {
            name: "Hobbies".into(),
            group_id: target.group_id.clone(),
            hidden: false,
        })
        .await
        .unwrap();

    let mut txn = NewTransaction::new(date(6), -4_200);
    txn.category = Some(doomed.clone());
    let ids = client
        .add_transactions(&checking, vec![txn], AddOptions::default())
        .await
        .unwrap();
    client.set_budget_amount(month(), &doomed, 10_000).await.unwrap();

    client.delete_category(&doomed, Some(&target.id)).await.unwrap();

    let listed = client.get_transactions(&checking, date(1), date(30)).await.unwrap();
    assert_eq!(listed[0].id, ids[0]);
    assert_eq!(listed[0].category.as_deref(), Some(target.id.as_str()));

    let budget = client.get_budget_month(month()).await.unwrap();
    let moved = budget
        .category_groups
        .iter()
        .flat_map(|g| &g.categories)
        .find(|c| c.id == target.id)
        .unwrap();
    assert_eq!(moved.budgeted, 10_000);
    assert_eq!(moved.spent, -4_200);
}

#[tokio::test]
async fn test_budget_month_reports_income() {
    let (_temp_dir, client) = client().await;
    let checking = account(client.as_ref(), "Checking", false, 0).await;
    let income = category_named(client.as_ref(), true).await;

    let mut paycheck = NewTransaction::new(date(1), 300_000);
    paycheck.category = Some(income.id.clone());
    client
        .add_transactions(&checking, vec![paycheck], AddOptions::default())
        .await
        .unwrap();

    let budget = client.get_budget_month(month()).await.unwrap();
    assert_eq!(budget.total_income, 300_000);
    assert_eq!(budget.to_budget, 300_000);

    let income_group = budget
        .category_groups
        .iter()
        .find(|g| g.is_income)
        .unwrap();
    assert_eq!(income_group.received, Some(300_000));
    assert!(client.get_budget_months().await.unwrap().contains(&"2025-04".to_string()));
}

#[tokio::test]
async fn test_query_over_transactions() {
    let (_temp_dir, client) = client().await;
    let checking = account(client.as_ref(), "Checking", false, 0).await;
    let rows = vec![
        NewTransaction::new(date(1), -500),
        NewTransaction::new(date(2), -50_000),
        NewTransaction::new(date(3), 12_000),
    ];
    client
        .add_transactions(&checking, rows, AddOptions::default())
        .await
        .unwrap();

    let query: Query = serde_json::from_value(json!({
        "table": "transactions",
        "filter": {"amount": {"$lt": 0}},
        "orderBy": [{"amount": "asc"}],
        "select": ["amount", "date"]
    }))
    .unwrap();
    let result = client.run_query(query).await.unwrap();
    assert_eq!(
        result,
        json!({"data": [
            {"amount": -50_000, "date": "2025-04-02"},
            {"amount": -500, "date": "2025-04-01"}
        ]})
    );
}

#[tokio::test]
async fn test_budgets_survive_reload() {
    let temp_dir = TempDir::new().unwrap();
    let config = ClientConfig::local(temp_dir.path());

    let first = LocalConnector.connect(&config).await.unwrap();
    let id = first.create_budget("Household").await.unwrap();
    account(first.as_ref(), "Checking", false, 1_234).await;
    first.shutdown().await.unwrap();

    let second = LocalConnector.connect(&config).await.unwrap();
    let budgets = second.get_budgets().await.unwrap();
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(budgets[0].name, "Household");

    second.load_budget(&id).await.unwrap();
    let accounts = second.get_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(
        second.get_account_balance(&accounts[0].id, None).await.unwrap(),
        1_234
    );
}

#[tokio::test]
async fn test_rejected_rows_leave_no_payees() {
    let (_temp_dir, client) = client().await;
    let checking = account(client.as_ref(), "Checking", false, 0).await;
    let before = client.get_payees().await.unwrap().len();

    let mut named = NewTransaction::new(date(1), -500);
    named.payee_name = Some("Ghost".into());
    let mut mismatched = NewTransaction::new(date(2), -1_000);
    mismatched.subtransactions = vec![NewSubTransaction {
        amount: -999,
        ..NewSubTransaction::default()
    }];

    let err = client
        .add_transactions(&checking, vec![named, mismatched], AddOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let payees = client.get_payees().await.unwrap();
    assert_eq!(payees.len(), before);
    assert!(payees.iter().all(|p| p.name != "Ghost"));
    assert!(client.get_transactions(&checking, date(1), date(30)).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_batches_keep_concurrent_changes() {
    let (_temp_dir, client) = client().await;
    let income = category_named(client.as_ref(), true).await;
    let expenses: Vec<Category> = client
        .get_categories()
        .await
        .unwrap()
        .into_iter()
        .filter(|c| !c.is_income)
        .collect();

    let mut setters = Vec::new();
    let mut batches = Vec::new();
    for (i, category) in expenses.iter().enumerate() {
        let amount = 1_000 * (i as i64 + 1);
        let setter = client.clone();
        let id = category.id.clone();
        setters.push(tokio::spawn(async move {
            setter.set_budget_amount(month(), &id, amount).await
        }));

        // Budgeting an income category fails after the first update is applied
        let batcher = client.clone();
        let updates = vec![
            BudgetUpdate::SetAmount {
                month: month(),
                category_id: category.id.clone(),
                amount: 7,
            },
            BudgetUpdate::SetAmount {
                month: month(),
                category_id: income.id.clone(),
                amount: 7,
            },
        ];
        batches.push(tokio::spawn(async move { batcher.batch_budget_updates(updates).await }));
    }

    for setter in setters {
        setter.await.unwrap().unwrap();
    }
    for batch in batches {
        assert!(batch.await.unwrap().unwrap_err().is_validation());
    }

    let budget = client.get_budget_month(month()).await.unwrap();
    for (i, category) in expenses.iter().enumerate() {
        let listed = budget
            .category_groups
            .iter()
            .flat_map(|g| &g.categories)
            .find(|c| c.id == category.id)
            .unwrap();
        assert_eq!(listed.budgeted, 1_000 * (i as i64 + 1));
    }
}
