use super::*;
use crate::state::test_helpers;
use serde_json::json;

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn preview_renders_known_component() {
    let state = test_helpers::test_app_state();
    let event = json!({
        "type": "ui_render",
        "component": "quote_fetcher",
        "props": { "stage": "fetching", "progress": 40, "message": "Asking 3 vendors", "vendors": ["Globex"] }
    });

    let response = preview(State(state), Json(event)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["component"], "quote_fetcher");
    assert_eq!(body["phase"], "fetching");
    assert_eq!(body["caption"], "Fetching vendor quotes...");
    assert_eq!(body["progress"], 40);
    assert_eq!(body["widget"]["kind"], "quote_fetcher");
    let html = body["html"].as_str().expect("html");
    assert!(html.contains("40%"));
    assert!(html.contains("Fetching vendor quotes..."));
}

#[tokio::test]
async fn preview_unknown_component_uses_fallback() {
    let state = test_helpers::test_app_state();
    let event = json!({ "type": "ui_render", "component": "mystery_widget", "props": { "message": "hi", "x": [1, 2] } });

    let body = body_json(preview(State(state), Json(event)).await).await;
    assert_eq!(body["component"], "mystery_widget");
    assert_eq!(body["widget"]["kind"], "fallback");
    assert!(body["html"].as_str().expect("html").contains("hi"));
}

#[tokio::test]
async fn preview_rejects_out_of_range_progress() {
    let state = test_helpers::test_app_state();
    let event = json!({ "type": "ui_render", "component": "thinking_loader", "props": { "progress": 150 } });

    let response = preview(State(state), Json(event)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "E_PROGRESS_OUT_OF_RANGE");
}

#[tokio::test]
async fn preview_rejects_wrong_event_type() {
    let state = test_helpers::test_app_state();
    let event = json!({ "type": "tool_call", "component": "thinking_loader" });

    let response = preview(State(state), Json(event)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "E_MALFORMED_EVENT");
}

#[tokio::test]
async fn components_lists_all_registered() {
    let state = test_helpers::test_app_state();
    let Json(names) = components(State(state)).await;
    assert_eq!(names.len(), ComponentName::ALL.len());
    assert!(names.contains(&ComponentName::PaymentSuccess));
}

#[tokio::test]
async fn render_data_omits_progress_when_absent() {
    let state = test_helpers::test_app_state();
    let event = WorkflowEvent::from_value(json!({ "type": "ui_render", "component": "thinking_loader", "props": {} }))
        .expect("event");
    let render = RenderState::from_event(&state.registry, event).expect("render");

    let data = render_data(&render);
    assert_eq!(data.get("progress"), Some(&serde_json::Value::Null));
    assert_eq!(data.get("phase"), Some(&json!("idle")));
    let html = data.get("html").and_then(|v| v.as_str()).expect("html");
    assert!(!html.contains('%'));
}
