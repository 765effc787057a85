//! HTTP API tests, driving the router in-process

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use envelope_api::bootstrap::{ClientGuard, GuardStatus};
use envelope_api::client::{BudgetClient, Connector, LocalConnector};
use envelope_api::config::ClientConfig;
use envelope_api::error::{EnvelopeError, EnvelopeResult};
use envelope_api::server::router;
use envelope_api::server::state::AppState;

#[derive(Clone, Copy)]
enum Mode {
    Healthy,
    FailFirst,
    PanicFirst,
}

/// Local connector that counts startups and can break the first one
struct TestConnector {
    calls: AtomicUsize,
    mode: Mode,
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self, config: &ClientConfig) -> EnvelopeResult<Arc<dyn BudgetClient>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        match self.mode {
            Mode::FailFirst if call == 0 => Err(EnvelopeError::Config("sync server unreachable".into())),
            Mode::PanicFirst if call == 0 => panic!("connector exploded"),
            _ => LocalConnector.connect(config).await,
        }
    }
}

struct TestApp {
    _temp_dir: TempDir,
    app: Router,
    guard: Arc<ClientGuard>,
    connector: Arc<TestConnector>,
}

impl TestApp {
    async fn new(mode: Mode, with_budget: bool) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = ClientConfig::local(temp_dir.path());

        if with_budget {
            let client = LocalConnector.connect(&config).await.unwrap();
            client.create_budget("Household").await.unwrap();
            client.shutdown().await.unwrap();
        }

        let connector = Arc::new(TestConnector {
            calls: AtomicUsize::new(0),
            mode,
        });
        let guard = Arc::new(ClientGuard::new(connector.clone(), config));
        let app = router::build(AppState::new(guard.clone()));
        Self {
            _temp_dir: temp_dir,
            app,
            guard,
            connector,
        }
    }

    fn startups(&self) -> usize {
        self.connector.calls.load(Ordering::SeqCst)
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn send_raw(&self, method: &str, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_never_bootstraps() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (status, body) = t.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["initialized"], false);
    assert_eq!(body["state"], "uninitialized");
    assert!(body["timestamp"].is_string());
    assert_eq!(t.startups(), 0);

    let (status, _) = t.send("GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t.send("GET", "/health", None).await;
    assert_eq!(body["initialized"], true);
    assert_eq!(body["state"], "ready");
    assert_eq!(t.startups(), 1);
}

#[tokio::test]
async fn test_concurrent_first_requests_start_client_once() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let responses =
        futures::future::join_all((0..10).map(|_| t.send("GET", "/api/accounts", None))).await;
    assert!(responses.iter().all(|(status, _)| *status == StatusCode::OK));
    assert_eq!(t.startups(), 1);

    t.send("GET", "/api/categories", None).await;
    assert_eq!(t.startups(), 1);
}

#[tokio::test]
async fn test_failed_bootstrap_is_retried() {
    let t = TestApp::new(Mode::FailFirst, true).await;

    let (status, body) = t.send("GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("sync server unreachable"));
    assert_eq!(t.guard.status(), GuardStatus::Failed);

    let (status, _) = t.send("GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.startups(), 2);
}

#[tokio::test]
async fn test_panicking_startup_is_contained() {
    let t = TestApp::new(Mode::PanicFirst, true).await;

    let (status, body) = t.send("GET", "/api/payees", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, _) = t.send("GET", "/api/payees", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_utils_round_trip_without_client() {
    let t = TestApp::new(Mode::Healthy, false).await;

    let (status, body) = t
        .send("POST", "/api/utils/amount-to-integer", Some(json!({"amount": 12.34})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 1234);

    let (status, body) = t
        .send("POST", "/api/utils/integer-to-amount", Some(json!({"amount": body["amount"]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 12.34);

    let (status, body) = t
        .send("POST", "/api/utils/amount-to-integer", Some(json!({"amount": "twelve"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = t
        .send("POST", "/api/utils/integer-to-amount", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.startups(), 0);
}

#[tokio::test]
async fn test_missing_inputs_are_rejected_before_bootstrap() {
    let t = TestApp::new(Mode::Healthy, true).await;

    for uri in [
        "/api/transactions",
        "/api/transactions?accountId=a",
        "/api/transactions?accountId=a&startDate=2025-01-01",
    ] {
        let (status, body) = t.send("GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }

    let (status, _) = t
        .send("GET", "/api/transactions?accountId=a&startDate=soon&endDate=2025-01-31", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .send("POST", "/api/transactions", Some(json!({"accountId": "missing-account"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "transactions is required");

    let (status, _) = t.send("POST", "/api/accounts", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.send("GET", "/api/budget/month/2025-13", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(t.startups(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (status, body) = t.send_raw("POST", "/api/accounts", "{\"account\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(t.startups(), 0);
}

#[tokio::test]
async fn test_unknown_routes_echo_path_and_method() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (status, body) = t.send("GET", "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], "/api/nothing-here");
    assert_eq!(body["method"], "GET");
    assert!(body["error"].is_string());

    let (status, body) = t.send("DELETE", "/api/sync", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["method"], "DELETE");
    assert_eq!(t.startups(), 0);
}

#[tokio::test]
async fn test_account_create_and_balance() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (status, body) = t
        .send(
            "POST",
            "/api/accounts",
            Some(json!({"account": {"name": "Checking"}, "initialBalance": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = t.send("GET", &format!("/api/accounts/{id}/balance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"balance": 0}));

    let (_, accounts) = t.send("GET", "/api/accounts", None).await;
    assert_eq!(accounts[0]["name"], "Checking");
    assert_eq!(accounts[0]["offbudget"], false);
}

#[tokio::test]
async fn test_client_errors_are_verbatim_500s() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (status, body) = t.send("GET", "/api/accounts/nope/balance", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Account not found: nope");
}

#[tokio::test]
async fn test_no_budget_is_a_client_error() {
    let t = TestApp::new(Mode::Healthy, false).await;

    let (status, body) = t.send("GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No budget loaded");
    assert_eq!(t.guard.status(), GuardStatus::Ready);

    let (status, body) = t.send("POST", "/api/budgets", Some(json!({"name": "Fresh"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].is_string());

    let (status, _) = t.send("GET", "/api/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_transaction_lifecycle() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (_, body) = t
        .send(
            "POST",
            "/api/accounts",
            Some(json!({"account": {"name": "Checking"}, "initialBalance": 10000})),
        )
        .await;
    let account = body["id"].as_str().unwrap().to_string();

    let (status, body) = t
        .send(
            "POST",
            "/api/transactions",
            Some(json!({
                "accountId": account,
                "transactions": [
                    {"date": "2025-01-05", "amount": -2500, "payee_name": "Grocer"},
                    {"date": "2025-01-10", "amount": -1000, "payee_name": "Cafe"}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let ids: Vec<String> = serde_json::from_value(body["ids"].clone()).unwrap();
    assert_eq!(ids.len(), 2);

    let list_uri =
        format!("/api/transactions?accountId={account}&startDate=2025-01-01&endDate=2025-01-31");
    let (status, listed) = t.send("GET", &list_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);
    assert_eq!(listed[0]["date"], "2025-01-10");

    let (_, body) = t.send("GET", &format!("/api/accounts/{account}/balance"), None).await;
    assert_eq!(body["balance"], 6500);
    let (_, body) = t
        .send("GET", &format!("/api/accounts/{account}/balance?cutoff=2025-01-06"), None)
        .await;
    assert_eq!(body["balance"], 7500);

    let (status, _) = t
        .send(
            "PUT",
            &format!("/api/transactions/{}", ids[0]),
            Some(json!({"transaction": {"notes": "weekly shop"}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("DELETE", &format!("/api/transactions/{}", ids[1]), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = t.send("GET", &list_uri, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["notes"], "weekly shop");
}

#[tokio::test]
async fn test_budget_month_and_batch() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (_, categories) = t.send("GET", "/api/categories", None).await;
    let expense = categories
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["is_income"] == false)
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = t
        .send(
            "POST",
            "/api/budget/amount",
            Some(json!({"month": "2025-03", "categoryId": expense, "amount": 5000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, month) = t.send("GET", "/api/budget/month/2025-03", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(month["month"], "2025-03");
    assert_eq!(month["totalBudgeted"], 5000);

    // One bad operation rolls back the whole batch
    let (status, _) = t
        .send(
            "POST",
            "/api/batch",
            Some(json!({"updates": [
                {"type": "set-amount", "month": "2025-03", "categoryId": expense, "amount": 9000},
                {"type": "set-amount", "month": "2025-03", "categoryId": "missing", "amount": 1}
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, month) = t.send("GET", "/api/budget/month/2025-03", None).await;
    assert_eq!(month["totalBudgeted"], 5000);
}

#[tokio::test]
async fn test_query_endpoint() {
    let t = TestApp::new(Mode::Healthy, true).await;
    for name in ["Checking", "Savings"] {
        t.send("POST", "/api/accounts", Some(json!({"account": {"name": name}})))
            .await;
    }

    let (status, body) = t
        .send(
            "POST",
            "/api/query",
            Some(json!({"table": "accounts", "filter": {"name": {"$like": "sav%"}}, "select": ["name"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": [{"name": "Savings"}]}));

    let (status, _) = t
        .send("POST", "/api/query", Some(json!({"table": "nope"})))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

async fn create_account(t: &TestApp, name: &str, balance: i64) -> String {
    let (status, body) = t
        .send(
            "POST",
            "/api/accounts",
            Some(json!({"account": {"name": name}, "initialBalance": balance})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

async fn category_ids(t: &TestApp, income: bool) -> Vec<String> {
    let (_, categories) = t.send("GET", "/api/categories", None).await;
    categories
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["is_income"] == income)
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

async fn create_payee(t: &TestApp, name: &str) -> String {
    let (status, body) = t
        .send("POST", "/api/payees", Some(json!({"payee": {"name": name}})))
        .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

fn budget_category<'a>(month: &'a Value, id: &str) -> &'a Value {
    month["categoryGroups"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|g| g["categories"].as_array().unwrap())
        .find(|c| c["id"] == id)
        .unwrap()
}

#[tokio::test]
async fn test_out_of_range_amounts() {
    let t = TestApp::new(Mode::Healthy, true).await;

    let (status, body) = t
        .send("POST", "/api/utils/amount-to-integer", Some(json!({"amount": 1e300})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "amount is out of range");

    let account = create_account(&t, "Vault", i64::MAX).await;
    let (status, _) = t
        .send(
            "POST",
            "/api/transactions",
            Some(json!({
                "accountId": account,
                "transactions": [{"date": "2025-01-05", "amount": 5}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send("GET", &format!("/api/accounts/{account}/balance"), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Amount out of range"));
}

#[tokio::test]
async fn test_rejected_transactions_leave_no_payees() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let account = create_account(&t, "Checking", 0).await;

    let (status, body) = t
        .send(
            "POST",
            "/api/transactions",
            Some(json!({
                "accountId": account,
                "transactions": [
                    {"date": "2025-01-05", "amount": -500, "payee_name": "Ghost"},
                    {"date": "2025-01-06", "amount": -1000, "subtransactions": [{"amount": -999}]}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (_, payees) = t.send("GET", "/api/payees", None).await;
    assert!(payees.as_array().unwrap().iter().all(|p| p["name"] != "Ghost"));
    let (_, listed) = t
        .send(
            "GET",
            &format!("/api/transactions?accountId={account}&startDate=2025-01-01&endDate=2025-01-31"),
            None,
        )
        .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_close_and_reopen_account() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let checking = create_account(&t, "Checking", 5000).await;
    let savings = create_account(&t, "Savings", 0).await;
    let spare = create_account(&t, "Spare", 0).await;

    let (status, body) = t
        .send("POST", &format!("/api/accounts/{checking}/close"), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("transfer account is required"));

    let (status, body) = t
        .send(
            "POST",
            &format!("/api/accounts/{checking}/close"),
            Some(json!({"transferAccountId": savings})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    // A zero balance closes without a body
    let (status, _) = t.send("POST", &format!("/api/accounts/{spare}/close"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, accounts) = t.send("GET", "/api/accounts", None).await;
    let closed = |id: &str| {
        accounts
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["id"] == id)
            .unwrap()["closed"]
            .clone()
    };
    assert_eq!(closed(&checking), true);
    assert_eq!(closed(&spare), true);
    assert_eq!(closed(&savings), false);

    let (_, body) = t.send("GET", &format!("/api/accounts/{savings}/balance"), None).await;
    assert_eq!(body["balance"], 5000);
    let (_, body) = t.send("GET", &format!("/api/accounts/{checking}/balance"), None).await;
    assert_eq!(body["balance"], 0);

    let (status, _) = t
        .send("POST", &format!("/api/accounts/{checking}/reopen"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, accounts) = t.send("GET", "/api/accounts", None).await;
    let reopened = accounts
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["id"] == checking.as_str())
        .unwrap();
    assert_eq!(reopened["closed"], false);
}

#[tokio::test]
async fn test_rules_crud_and_payee_rules() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let payee = create_payee(&t, "Corner Shop").await;

    let (status, rule) = t
        .send(
            "POST",
            "/api/rules",
            Some(json!({"rule": {
                "conditions": [{"field": "payee", "op": "is", "value": payee}],
                "actions": [{"field": "notes", "value": "snacks"}]
            }})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = rule["id"].as_str().unwrap().to_string();
    assert_eq!(rule["stage"], "default");
    assert_eq!(rule["conditionsOp"], "and");
    assert_eq!(rule["actions"][0]["op"], "set");

    let (_, rules) = t.send("GET", "/api/rules", None).await;
    assert_eq!(rules.as_array().unwrap().len(), 1);
    let (status, rules) = t.send("GET", &format!("/api/payees/{payee}/rules"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rules[0]["id"], id.as_str());

    let (status, updated) = t
        .send(
            "PUT",
            &format!("/api/rules/{id}"),
            Some(json!({"rule": {
                "conditionsOp": "or",
                "conditions": [{"field": "payee", "op": "is", "value": payee}],
                "actions": [{"field": "notes", "value": "treats"}]
            }})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["conditionsOp"], "or");
    assert_eq!(updated["actions"][0]["value"], "treats");

    let (status, _) = t.send("PUT", &format!("/api/rules/{id}"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.send("DELETE", &format!("/api/rules/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, rules) = t.send("GET", "/api/rules", None).await;
    assert!(rules.as_array().unwrap().is_empty());
    let (_, rules) = t.send("GET", &format!("/api/payees/{payee}/rules"), None).await;
    assert!(rules.as_array().unwrap().is_empty());

    let (status, _) = t.send("DELETE", &format!("/api/rules/{id}"), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_merge_payees() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let account = create_account(&t, "Checking", 0).await;
    let keep = create_payee(&t, "Corner Shop").await;
    let dupe = create_payee(&t, "CORNER SHOP #12").await;

    t.send(
        "POST",
        "/api/transactions",
        Some(json!({
            "accountId": account,
            "transactions": [{"date": "2025-02-01", "amount": -300, "payee": dupe}]
        })),
    )
    .await;
    t.send(
        "POST",
        "/api/rules",
        Some(json!({"rule": {
            "conditions": [{"field": "payee", "op": "is", "value": dupe}],
            "actions": [{"field": "notes", "value": "snacks"}]
        }})),
    )
    .await;

    let (status, body) = t
        .send("POST", "/api/payees/merge", Some(json!({"targetId": keep})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "mergeIds is required");

    let (status, _) = t
        .send(
            "POST",
            "/api/payees/merge",
            Some(json!({"targetId": keep, "mergeIds": [dupe]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, payees) = t.send("GET", "/api/payees", None).await;
    assert!(payees.as_array().unwrap().iter().all(|p| p["id"] != dupe.as_str()));

    let (_, listed) = t
        .send(
            "GET",
            &format!("/api/transactions?accountId={account}&startDate=2025-02-01&endDate=2025-02-28"),
            None,
        )
        .await;
    assert_eq!(listed[0]["payee"], keep.as_str());

    let (_, rules) = t.send("GET", &format!("/api/payees/{keep}/rules"), None).await;
    assert_eq!(rules.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_hold_and_reset_hold() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let account = create_account(&t, "Checking", 0).await;
    let income = category_ids(&t, true).await.remove(0);

    t.send(
        "POST",
        "/api/transactions",
        Some(json!({
            "accountId": account,
            "transactions": [{"date": "2025-03-02", "amount": 10000, "category": income}]
        })),
    )
    .await;

    let (status, _) = t
        .send("POST", "/api/budget/hold", Some(json!({"month": "2025-03"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "POST",
            "/api/budget/hold",
            Some(json!({"month": "2025-03", "amount": 4000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, march) = t.send("GET", "/api/budget/month/2025-03", None).await;
    assert_eq!(march["forNextMonth"], 4000);
    assert_eq!(march["toBudget"], 6000);
    let (_, april) = t.send("GET", "/api/budget/month/2025-04", None).await;
    assert_eq!(april["fromLastMonth"], 10000);

    let (status, _) = t
        .send("POST", "/api/budget/reset-hold", Some(json!({"month": "2025-03"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, march) = t.send("GET", "/api/budget/month/2025-03", None).await;
    assert_eq!(march["forNextMonth"], 0);
    assert_eq!(march["toBudget"], 10000);
}

#[tokio::test]
async fn test_carryover_keeps_overspending_in_category() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let account = create_account(&t, "Checking", 0).await;
    let expenses = category_ids(&t, false).await;
    let (carried, absorbed) = (expenses[0].clone(), expenses[1].clone());

    t.send(
        "POST",
        "/api/transactions",
        Some(json!({
            "accountId": account,
            "transactions": [
                {"date": "2025-03-05", "amount": -3000, "category": carried},
                {"date": "2025-03-06", "amount": -1000, "category": absorbed}
            ]
        })),
    )
    .await;

    let (status, body) = t
        .send(
            "POST",
            "/api/budget/carryover",
            Some(json!({"month": "2025-03", "categoryId": carried})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "flag is required");

    let (status, _) = t
        .send(
            "POST",
            "/api/budget/carryover",
            Some(json!({"month": "2025-03", "categoryId": carried, "flag": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, march) = t.send("GET", "/api/budget/month/2025-03", None).await;
    assert_eq!(budget_category(&march, &carried)["carryover"], true);
    assert_eq!(budget_category(&march, &absorbed)["carryover"], false);

    let (_, april) = t.send("GET", "/api/budget/month/2025-04", None).await;
    assert_eq!(budget_category(&april, &carried)["balance"], -3000);
    assert_eq!(budget_category(&april, &absorbed)["balance"], 0);
    assert_eq!(april["lastMonthOverspent"], -1000);
}

#[tokio::test]
async fn test_delete_category_group_with_transfer_target() {
    let t = TestApp::new(Mode::Healthy, true).await;
    let account = create_account(&t, "Checking", 0).await;
    let target = category_ids(&t, false).await.remove(0);

    let (status, body) = t
        .send("POST", "/api/category-groups", Some(json!({"group": {"name": "Fun"}})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let group = body["id"].as_str().unwrap().to_string();
    let (status, body) = t
        .send(
            "POST",
            "/api/categories",
            Some(json!({"category": {"name": "Games", "group_id": group}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let games = body["id"].as_str().unwrap().to_string();

    t.send(
        "POST",
        "/api/transactions",
        Some(json!({
            "accountId": account,
            "transactions": [{"date": "2025-03-07", "amount": -2000, "category": games}]
        })),
    )
    .await;
    t.send(
        "POST",
        "/api/budget/amount",
        Some(json!({"month": "2025-03", "categoryId": games, "amount": 5000})),
    )
    .await;

    // The target must live outside the group
    let (status, body) = t
        .send(
            "DELETE",
            &format!("/api/category-groups/{group}?transferCategoryId={games}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("outside the group"));

    let (status, _) = t
        .send(
            "DELETE",
            &format!("/api/category-groups/{group}?transferCategoryId={target}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, groups) = t.send("GET", "/api/category-groups", None).await;
    assert!(groups.as_array().unwrap().iter().all(|g| g["id"] != group.as_str()));

    let (_, listed) = t
        .send(
            "GET",
            &format!("/api/transactions?accountId={account}&startDate=2025-03-01&endDate=2025-03-31"),
            None,
        )
        .await;
    assert_eq!(listed[0]["category"], target.as_str());

    let (_, march) = t.send("GET", "/api/budget/month/2025-03", None).await;
    assert_eq!(budget_category(&march, &target)["budgeted"], 5000);
    assert_eq!(budget_category(&march, &target)["spent"], -2000);
}
