//! End-to-end dispatch flows against an in-memory store and a scripted
//! gateway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use database::{campaign, item, CampaignStatus, Database, ItemStatus, NewCampaign, ScheduleMode,
    VariableBinding};
use dispatcher::{
    ingest_rows, parse_recipient_rows, DispatchError, Dispatcher, PhoneOptions, RejectReason,
    RunOptions, TemplateSender, BACKOFF_BASE_MS,
};
use message_gateway::{GatewayError, TemplateSend, TemplateSendResult};

/// Gateway double: either acknowledges every send or refuses every send,
/// recording what it saw.
struct ScriptedGateway {
    succeed: bool,
    counter: AtomicU64,
    sends: Mutex<Vec<TemplateSend>>,
}

impl ScriptedGateway {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            succeed: true,
            counter: AtomicU64::new(0),
            sends: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            succeed: false,
            counter: AtomicU64::new(0),
            sends: Mutex::new(Vec::new()),
        })
    }

    fn recorded(&self) -> Vec<TemplateSend> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateSender for ScriptedGateway {
    async fn send_template(
        &self,
        params: TemplateSend,
    ) -> Result<TemplateSendResult, GatewayError> {
        self.sends.lock().unwrap().push(params);
        if self.succeed {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(TemplateSendResult {
                contact_id: Some(format!("contact-{n}")),
                message_id: format!("msg-{n}"),
                timestamp: None,
            })
        } else {
            Err(GatewayError::Provider {
                code: "131026".to_string(),
                message: "recipient unreachable".to_string(),
            })
        }
    }
}

const CSV_FOUR_VALID_ONE_BAD: &str = "\
phone,name,due
+1 555 000 0001,Alice,Mar 1
+1 555 000 0002,Bob,Mar 2
+1 555 000 0003,Carol,Mar 3
+1 555 000 0004,Dan,Mar 4
not-a-phone,Eve,Mar 5
";

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}

fn renewal_campaign(id: &str) -> NewCampaign {
    NewCampaign {
        id: id.to_string(),
        created_by: "ops".to_string(),
        agent_id: "agent-1".to_string(),
        title: "March renewal".to_string(),
        template_name: "renewal_notice".to_string(),
        template_language: "en".to_string(),
        sender_id: None,
        max_attempts: 5,
        priority: 0,
        file_name: "recipients.csv".to_string(),
        file_path: None,
        phone_column: "phone".to_string(),
        name_column: Some("name".to_string()),
        key_column: None,
        variable_bindings: vec![
            VariableBinding {
                template_var: "1".to_string(),
                source_column: "name".to_string(),
                fallback: None,
            },
            VariableBinding {
                template_var: "2".to_string(),
                source_column: "due".to_string(),
                fallback: Some("soon".to_string()),
            },
        ],
        schedule_mode: ScheduleMode::Immediate,
        scheduled_at: None,
        timezone: None,
    }
}

/// Create a campaign and ingest the CSV, returning the db handle.
async fn seeded_campaign(id: &str, csv: &str) -> Database {
    let db = test_db().await;
    campaign::create_campaign(db.pool(), &renewal_campaign(id)).await.unwrap();
    let fetched = campaign::get_campaign(db.pool(), id).await.unwrap();
    let rows = parse_recipient_rows(csv.as_bytes()).unwrap();
    ingest_rows(&db, &fetched, &rows, &PhoneOptions::default(), now_ms())
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn ingestion_is_complete_and_ordered() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    assert_eq!(fetched.status, CampaignStatus::Queued);
    assert_eq!(fetched.stats_total, 5);
    assert_eq!(fetched.stats_queued, 4);
    assert_eq!(fetched.stats_ignored, 1);

    let items = item::list_items(db.pool(), "c1", None, 0, 100).await.unwrap();
    assert_eq!(items.len(), 5);
    let indexes: Vec<i64> = items.iter().map(|i| i.row_index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3, 4]);

    // The malformed phone row is ignored and never transitions further.
    assert_eq!(items[4].status, ItemStatus::Ignored);
    assert_eq!(items[4].phone, None);
    assert_eq!(items[4].raw_phone, "not-a-phone");

    // Variable bindings resolved per row, fallback applied only when empty.
    let vars = items[0].variables_map().unwrap();
    assert_eq!(vars.get("1").map(String::as_str), Some("Alice"));
    assert_eq!(vars.get("2").map(String::as_str), Some("Mar 1"));
}

#[tokio::test]
async fn ingestion_with_no_valid_phones_errors_the_campaign() {
    let db = seeded_campaign("c1", "phone,name\nabc,X\n,Y\n").await;

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    assert_eq!(fetched.status, CampaignStatus::Error);
    assert!(fetched.last_error.is_some());
    assert_eq!(fetched.stats_ignored, 2);
}

#[tokio::test]
async fn successful_batch_drains_and_completes() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;
    let gateway = ScriptedGateway::succeeding();
    let engine = Dispatcher::new(db.clone(), gateway.clone());

    let report = engine.run_batch("c1", &RunOptions::default()).await.unwrap();
    assert_eq!(report.claimed, 4);
    assert_eq!(report.sent, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(report.remaining_queued, 0);
    assert!(report.completed);

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    assert_eq!(fetched.status, CampaignStatus::Completed);
    assert_eq!(fetched.stats_sent, 4);
    assert!(fetched.finished_at.is_some());

    // Sends went out in row order with campaign:item correlation tokens.
    let sends = gateway.recorded();
    assert_eq!(sends.len(), 4);
    assert_eq!(sends[0].to, "15550000001");
    assert_eq!(sends[0].template_name, "renewal_notice");
    let items = item::list_items(db.pool(), "c1", Some(ItemStatus::Sent), 0, 10)
        .await
        .unwrap();
    assert_eq!(
        sends[0].correlation_token.as_deref(),
        Some(format!("c1:{}", items[0].id).as_str())
    );

    // Every sent item carries a provider message id and one attempt.
    for sent_item in &items {
        assert!(sent_item.message_id.is_some());
        assert_eq!(sent_item.attempts, 1);
        assert_eq!(sent_item.lock_owner, None);
    }
}

#[tokio::test]
async fn failing_gateway_backs_off_and_leaves_queue() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;
    let engine = Dispatcher::new(db.clone(), ScriptedGateway::failing());

    let report = engine
        .run_batch(
            "c1",
            &RunOptions {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(report.remaining_queued, 2);
    assert!(!report.completed);

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    assert_eq!(fetched.status, CampaignStatus::Queued);
    assert_eq!(fetched.stats_failed, 2);

    let failed = item::list_items(db.pool(), "c1", Some(ItemStatus::Failed), 0, 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 2);
    for failed_item in &failed {
        assert_eq!(failed_item.attempts, 1);
        assert_eq!(failed_item.error_code.as_deref(), Some("131026"));
        // First failure arms the base backoff delay.
        let delay = failed_item.next_retry_at.unwrap() - failed_item.last_attempt_at.unwrap();
        assert_eq!(delay, BACKOFF_BASE_MS);
    }
}

#[tokio::test]
async fn paused_campaign_rejects_before_any_claim() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;
    campaign::pause_campaign(db.pool(), "c1").await.unwrap();

    let engine = Dispatcher::new(db.clone(), ScriptedGateway::succeeding());
    let err = engine.run_batch("c1", &RunOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Rejected {
            reason: RejectReason::Paused,
            ..
        }
    ));

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    assert_eq!(fetched.stats_queued, 4);
    let queued = item::count_items(db.pool(), "c1", ItemStatus::Queued).await.unwrap();
    assert_eq!(queued, 4);
}

#[tokio::test]
async fn scheduled_campaign_rejects_until_due() {
    let db = test_db().await;
    let mut spec = renewal_campaign("c1");
    spec.schedule_mode = ScheduleMode::Scheduled;
    spec.scheduled_at = Some(now_ms() + 3_600_000);
    campaign::create_campaign(db.pool(), &spec).await.unwrap();

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    let rows = parse_recipient_rows(CSV_FOUR_VALID_ONE_BAD.as_bytes()).unwrap();
    let report = ingest_rows(&db, &fetched, &rows, &PhoneOptions::default(), now_ms())
        .await
        .unwrap();
    assert_eq!(report.status, CampaignStatus::Scheduled);

    let engine = Dispatcher::new(db.clone(), ScriptedGateway::succeeding());
    let err = engine.run_batch("c1", &RunOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Rejected {
            reason: RejectReason::NotYetScheduled { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn retry_recovers_a_failed_item_and_rejects_sent() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;

    // First attempt fails through the batch loop.
    let failing = Dispatcher::new(db.clone(), ScriptedGateway::failing());
    failing
        .run_batch(
            "c1",
            &RunOptions {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let failed = item::list_items(db.pool(), "c1", Some(ItemStatus::Failed), 0, 10)
        .await
        .unwrap();
    let target = &failed[0];

    // Operator retry goes through immediately, ignoring the retry timer.
    let engine = Dispatcher::new(db.clone(), ScriptedGateway::succeeding());
    let report = engine.retry_item(&target.id, &RunOptions::default()).await.unwrap();
    assert!(report.sent);
    assert_eq!(report.item.status, ItemStatus::Sent);
    assert_eq!(report.item.attempts, 2);

    // A second retry of the now-sent item is rejected: no double send.
    let err = engine
        .retry_item(&target.id, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::ItemNotRetryable {
            status: ItemStatus::Sent,
            ..
        }
    ));
}

#[tokio::test]
async fn retry_on_paused_campaign_reverts_the_claim() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;

    let failing = Dispatcher::new(db.clone(), ScriptedGateway::failing());
    failing
        .run_batch(
            "c1",
            &RunOptions {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    campaign::pause_campaign(db.pool(), "c1").await.unwrap();

    let failed = item::list_items(db.pool(), "c1", Some(ItemStatus::Failed), 0, 10)
        .await
        .unwrap();
    let target = &failed[0];

    let engine = Dispatcher::new(db.clone(), ScriptedGateway::succeeding());
    let err = engine
        .retry_item(&target.id, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Rejected {
            reason: RejectReason::Paused,
            ..
        }
    ));

    // The item is back in `failed`, not parked in `claimed`.
    let reverted = item::get_item(db.pool(), &target.id).await.unwrap();
    assert_eq!(reverted.status, ItemStatus::Failed);
    assert_eq!(reverted.lock_owner, None);
}

#[tokio::test]
async fn repeated_invocations_converge_to_completed() {
    let db = seeded_campaign("c1", CSV_FOUR_VALID_ONE_BAD).await;
    let engine = Dispatcher::new(db.clone(), ScriptedGateway::succeeding());

    let options = RunOptions {
        limit: Some(1),
        ..Default::default()
    };

    let mut reports = Vec::new();
    for _ in 0..4 {
        reports.push(engine.run_batch("c1", &options).await.unwrap());
    }

    // Completion flips exactly when the live queued count reaches zero.
    assert_eq!(reports[2].remaining_queued, 1);
    assert!(!reports[2].completed);
    assert_eq!(reports[3].remaining_queued, 0);
    assert!(reports[3].completed);

    let fetched = campaign::get_campaign(db.pool(), "c1").await.unwrap();
    assert_eq!(fetched.status, CampaignStatus::Completed);
    assert_eq!(fetched.stats_sent, 4);
    assert_eq!(fetched.stats_queued, 0);
}

#[tokio::test]
async fn dispatch_on_missing_campaign_is_not_found() {
    let db = test_db().await;
    let engine = Dispatcher::new(db, ScriptedGateway::succeeding());
    let err = engine.run_batch("ghost", &RunOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Database(database::DatabaseError::NotFound { .. })
    ));
}
