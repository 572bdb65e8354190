use super::*;
use crate::frame::ErrorCode;

#[test]
fn error_codes() {
    let id = Uuid::new_v4();
    assert_eq!(ThreadError::NotFound(id).error_code(), "E_THREAD_NOT_FOUND");
    assert!(!ThreadError::NotFound(id).retryable());
    assert!(ThreadError::Database(sqlx::Error::PoolTimedOut).retryable());
}

#[test]
fn not_found_message_names_the_thread() {
    let id = Uuid::nil();
    assert_eq!(ThreadError::NotFound(id).to_string(), format!("suggestion thread not found: {id}"));
}

#[test]
fn writes_report_their_thread() {
    let id = Uuid::new_v4();
    let create = ThreadWrite::Create(NewThread {
        id,
        organization_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        request_id: None,
        prompt: "p".into(),
    });
    let render = ThreadWrite::Render { id, component: "error_card".into(), phase: Phase::Error };
    assert_eq!(create.thread_id(), id);
    assert_eq!(render.thread_id(), id);
}

#[tokio::test]
async fn enqueue_on_full_or_closed_queue_drops_without_blocking() {
    let (tx, rx) = mpsc::channel(1);
    let write = || ThreadWrite::Render { id: Uuid::nil(), component: "x".into(), phase: Phase::Idle };
    enqueue(&tx, write());
    enqueue(&tx, write());
    drop(rx);
    enqueue(&tx, write());
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    async fn pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required for live-db-tests");
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.expect("connect");
        sqlx::migrate!("src/db/migrations").run(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    async fn create_then_record_render() {
        let pool = pool().await;
        let user_id: Uuid = sqlx::query("INSERT INTO users (email, name) VALUES ($1, 'Thread') RETURNING id")
            .bind(format!("{}@example.com", Uuid::new_v4()))
            .fetch_one(&pool)
            .await
            .expect("user")
            .get("id");
        let organization_id: Uuid = sqlx::query("INSERT INTO organizations (name, slug) VALUES ('T', $1) RETURNING id")
            .bind(Uuid::new_v4().to_string())
            .fetch_one(&pool)
            .await
            .expect("org")
            .get("id");

        let thread = NewThread {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
            request_id: None,
            prompt: "10 monitors".into(),
        };
        create_thread(&pool, &thread).await.expect("create");
        record_render(&pool, thread.id, "quote_fetcher", Phase::Fetching)
            .await
            .expect("record");

        let recent = list_recent(&pool, organization_id, 10).await.expect("list");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].last_component.as_deref(), Some("quote_fetcher"));
        assert_eq!(recent[0].last_phase, "fetching");
    }

    #[tokio::test]
    async fn writer_applies_renders_in_order_and_keeps_the_last() {
        let pool = pool().await;
        let user_id: Uuid = sqlx::query("INSERT INTO users (email, name) VALUES ($1, 'Writer') RETURNING id")
            .bind(format!("{}@example.com", Uuid::new_v4()))
            .fetch_one(&pool)
            .await
            .expect("user")
            .get("id");
        let organization_id: Uuid = sqlx::query("INSERT INTO organizations (name, slug) VALUES ('W', $1) RETURNING id")
            .bind(Uuid::new_v4().to_string())
            .fetch_one(&pool)
            .await
            .expect("org")
            .get("id");

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(THREAD_QUEUE_CAPACITY);
        enqueue(&tx, ThreadWrite::Create(NewThread { id, organization_id, user_id, request_id: None, prompt: "desks".into() }));
        let renders = [
            ("thinking_loader", Phase::Parsing),
            ("inventory_check", Phase::Analyzing),
            ("quote_fetcher", Phase::Fetching),
            ("payment_processor", Phase::Processing),
            ("payment_success", Phase::Success),
        ];
        for (component, phase) in renders {
            enqueue(&tx, ThreadWrite::Render { id, component: component.into(), phase });
        }
        drop(tx);
        run_thread_writer(pool.clone(), rx).await;

        let recent = list_recent(&pool, organization_id, 10).await.expect("list");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, id);
        assert_eq!(recent[0].last_component.as_deref(), Some("payment_success"));
        assert_eq!(recent[0].last_phase, "success");
    }

    #[tokio::test]
    async fn record_render_unknown_thread_is_not_found() {
        let pool = pool().await;
        let err = record_render(&pool, Uuid::new_v4(), "x", Phase::Idle)
            .await
            .expect_err("missing");
        assert!(matches!(err, ThreadError::NotFound(_)));
    }
}
