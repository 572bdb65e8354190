use super::*;
use crate::frame::ErrorCode;
use crate::services::session::bytes_to_hex;
use serde_json::json;

const SECRET: &str = "whsec_test";
const NOW: i64 = 1_700_000_000;

fn sign(body: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).expect("hmac key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    format!("t={timestamp},v1={}", bytes_to_hex(&mac.finalize().into_bytes()))
}

fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
    serde_json::from_value(json!({ "id": "evt_1", "type": event_type, "data": { "object": object } }))
        .expect("event")
}

// =============================================================================
// hex_to_bytes
// =============================================================================

#[test]
fn hex_decodes_pairs() {
    assert_eq!(hex_to_bytes("00ff0a"), Some(vec![0x00, 0xff, 0x0a]));
    assert_eq!(hex_to_bytes(""), Some(vec![]));
}

#[test]
fn hex_rejects_odd_length_and_non_hex() {
    assert_eq!(hex_to_bytes("abc"), None);
    assert_eq!(hex_to_bytes("zz"), None);
    assert_eq!(hex_to_bytes("é0"), None);
}

// =============================================================================
// verify_signature
// =============================================================================

#[test]
fn valid_signature_passes() {
    let body = br#"{"id":"evt_1","type":"invoice.paid"}"#;
    let header = sign(body, NOW);
    assert!(verify_signature(SECRET, &header, body, NOW + 10).is_ok());
}

#[test]
fn any_matching_v1_entry_passes() {
    let body = b"{}";
    let good = sign(body, NOW);
    let header = format!("t={NOW},v1=deadbeef,{}", good.split_once(',').map(|(_, v)| v).expect("v1"));
    assert!(verify_signature(SECRET, &header, body, NOW).is_ok());
}

#[test]
fn tampered_body_fails() {
    let header = sign(b"{\"a\":1}", NOW);
    let err = verify_signature(SECRET, &header, b"{\"a\":2}", NOW).expect_err("mismatch");
    assert!(matches!(err, BillingError::SignatureMismatch));
    assert_eq!(err.error_code(), "E_BAD_SIGNATURE");
}

#[test]
fn stale_timestamp_fails() {
    let body = b"{}";
    let tolerance = i64::try_from(SIGNATURE_TOLERANCE_SECS).expect("tolerance fits i64");
    let header = sign(body, NOW - tolerance - 1);
    assert!(matches!(verify_signature(SECRET, &header, body, NOW), Err(BillingError::Stale)));
}

#[test]
fn extreme_timestamps_are_stale_not_a_panic() {
    for t in [i64::MIN, i64::MAX, -1] {
        let header = format!("t={t},v1=aa");
        assert!(
            matches!(verify_signature(SECRET, &header, b"{}", NOW), Err(BillingError::Stale)),
            "t={t} should be stale"
        );
    }
    assert!(matches!(
        verify_signature(SECRET, &format!("t={NOW},v1=aa"), b"{}", i64::MIN),
        Err(BillingError::Stale)
    ));
}

#[test]
fn non_hex_signature_is_a_mismatch() {
    let header = format!("t={NOW},v1=not-hex");
    assert!(matches!(verify_signature(SECRET, &header, b"{}", NOW), Err(BillingError::SignatureMismatch)));
}

#[test]
fn timestamp_at_tolerance_edge_passes() {
    let body = b"{}";
    let tolerance = i64::try_from(SIGNATURE_TOLERANCE_SECS).expect("tolerance fits i64");
    let header = sign(body, NOW + tolerance);
    assert!(verify_signature(SECRET, &header, body, NOW).is_ok());
}

#[test]
fn malformed_header_fails() {
    for header in ["", "t=abc,v1=00", "t=1", "v1=00", "t=1,v1="] {
        assert!(
            matches!(parse_signature_header(header), Err(BillingError::BadSignatureHeader)),
            "header {header:?} should be rejected"
        );
    }
}

#[test]
fn header_parsing_ignores_other_schemes() {
    let (t, sigs) = parse_signature_header("t=5, v0=old, v1=abc").expect("parse");
    assert_eq!(t, 5);
    assert_eq!(sigs, vec!["abc"]);
}

// =============================================================================
// classify
// =============================================================================

#[test]
fn active_subscription_sets_pro() {
    let ev = event("customer.subscription.updated", json!({ "customer": "cus_1", "status": "active" }));
    assert_eq!(classify(&ev), BillingAction::SetPlan { customer: "cus_1".into(), plan: "pro" });
}

#[test]
fn past_due_subscription_sets_free() {
    let ev = event("customer.subscription.created", json!({ "customer": "cus_1", "status": "past_due" }));
    assert_eq!(classify(&ev), BillingAction::SetPlan { customer: "cus_1".into(), plan: "free" });
}

#[test]
fn deleted_subscription_sets_free() {
    let ev = event("customer.subscription.deleted", json!({ "customer": "cus_9" }));
    assert_eq!(classify(&ev), BillingAction::SetPlan { customer: "cus_9".into(), plan: "free" });
}

#[test]
fn other_events_are_acknowledged() {
    assert_eq!(classify(&event("invoice.paid", json!({ "customer": "cus_1" }))), BillingAction::Acknowledge);
    assert_eq!(classify(&event("customer.subscription.updated", json!({}))), BillingAction::Acknowledge);
}

#[test]
fn unverified_plan_change_is_only_acknowledged() {
    let ev = event("customer.subscription.updated", json!({ "customer": "cus_1", "status": "active" }));
    assert_eq!(authorized_action(&ev, false), BillingAction::Acknowledge);
    assert_eq!(authorized_action(&ev, true), BillingAction::SetPlan { customer: "cus_1".into(), plan: "pro" });
}

#[test]
fn unverified_other_events_are_unchanged() {
    let ev = event("invoice.paid", json!({ "customer": "cus_1" }));
    assert_eq!(authorized_action(&ev, false), BillingAction::Acknowledge);
}

#[test]
fn parse_event_requires_id_and_type() {
    assert!(parse_event(br#"{"type":"invoice.paid"}"#).is_err());
    let ev = parse_event(br#"{"id":"evt_2","type":"ping"}"#).expect("parse");
    assert_eq!(ev.id, "evt_2");
    assert!(ev.data.object.is_null());
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use sqlx::Row;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    async fn pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required for live-db-tests");
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.expect("connect");
        sqlx::migrate!("src/db/migrations").run(&pool).await.expect("migrate");
        pool
    }

    async fn organization_with_customer(pool: &PgPool, customer: &str) -> Uuid {
        sqlx::query("INSERT INTO organizations (name, slug, stripe_customer_id) VALUES ('Billed', $1, $2) RETURNING id")
            .bind(Uuid::new_v4().to_string())
            .bind(customer)
            .fetch_one(pool)
            .await
            .expect("org")
            .get("id")
    }

    async fn plan_of(pool: &PgPool, id: Uuid) -> String {
        sqlx::query("SELECT plan FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("plan")
            .get("plan")
    }

    async fn recorded(pool: &PgPool, event_id: &str) -> bool {
        sqlx::query("SELECT 1 FROM stripe_events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(pool)
            .await
            .expect("lookup")
            .is_some()
    }

    fn subscription(customer: &str, status: &str) -> StripeEvent {
        serde_json::from_value(json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": "customer.subscription.updated",
            "data": { "object": { "customer": customer, "status": status } }
        }))
        .expect("event")
    }

    #[tokio::test]
    async fn verified_subscription_applies_then_redelivery_is_duplicate() {
        let pool = pool().await;
        let customer = format!("cus_{}", Uuid::new_v4().simple());
        let org = organization_with_customer(&pool, &customer).await;
        let ev = subscription(&customer, "active");

        assert_eq!(handle_event(&pool, &ev, true).await.expect("apply"), WebhookOutcome::Applied);
        assert_eq!(plan_of(&pool, org).await, "pro");
        assert!(recorded(&pool, &ev.id).await);

        assert_eq!(handle_event(&pool, &ev, true).await.expect("again"), WebhookOutcome::Duplicate);
    }

    #[tokio::test]
    async fn unknown_customer_is_acknowledged() {
        let pool = pool().await;
        let ev = subscription("cus_nobody", "active");
        assert_eq!(handle_event(&pool, &ev, true).await.expect("ack"), WebhookOutcome::Acknowledged);
        assert!(recorded(&pool, &ev.id).await);
    }

    #[tokio::test]
    async fn unverified_subscription_leaves_plan_alone() {
        let pool = pool().await;
        let customer = format!("cus_{}", Uuid::new_v4().simple());
        let org = organization_with_customer(&pool, &customer).await;
        let ev = subscription(&customer, "active");

        assert_eq!(handle_event(&pool, &ev, false).await.expect("ack"), WebhookOutcome::Acknowledged);
        assert_eq!(plan_of(&pool, org).await, "free");
    }

    #[tokio::test]
    async fn failed_apply_records_nothing_so_redelivery_applies() {
        let pool = pool().await;
        let suffix = Uuid::new_v4().simple().to_string();
        let customer = format!("cus_{suffix}");
        let org = organization_with_customer(&pool, &customer).await;
        let ev = subscription(&customer, "active");

        sqlx::query(&format!(
            "CREATE FUNCTION refuse_plan_{suffix}() RETURNS trigger AS $$ BEGIN \
             IF NEW.stripe_customer_id = '{customer}' THEN RAISE EXCEPTION 'plan update refused'; END IF; \
             RETURN NEW; END $$ LANGUAGE plpgsql"
        ))
        .execute(&pool)
        .await
        .expect("function");
        sqlx::query(&format!(
            "CREATE TRIGGER refuse_plan_{suffix} BEFORE UPDATE ON organizations \
             FOR EACH ROW EXECUTE FUNCTION refuse_plan_{suffix}()"
        ))
        .execute(&pool)
        .await
        .expect("trigger");

        let err = handle_event(&pool, &ev, true).await.expect_err("apply refused");
        assert!(matches!(err, BillingError::Database(_)));
        assert!(!recorded(&pool, &ev.id).await);

        sqlx::query(&format!("DROP TRIGGER refuse_plan_{suffix} ON organizations"))
            .execute(&pool)
            .await
            .expect("drop trigger");
        sqlx::query(&format!("DROP FUNCTION refuse_plan_{suffix}()"))
            .execute(&pool)
            .await
            .expect("drop function");

        assert_eq!(handle_event(&pool, &ev, true).await.expect("redelivery"), WebhookOutcome::Applied);
        assert_eq!(plan_of(&pool, org).await, "pro");
    }
}
