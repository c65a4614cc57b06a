use diesel::{QueryDsl, RunQueryDsl};
use dinetab::{models::Notification, schema::notifications};
use wiremock::{
    matchers::{header_exists, method, path_regex},
    Mock, ResponseTemplate,
};

use crate::helpers::TestApp;

#[actix_web::test]
async fn calling_a_waiter_records_a_notification_and_alerts_staff() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], Some("whatsapp:+31600000000"));
    let table_id = app.seed_table(branch_id, 7);

    app.join(&app.api_client, table_id, "Ana").await;

    let guard = Mock::given(path_regex(r"^/2010-04-01/Accounts/.*/Messages\.json$"))
        .and(method("POST"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount_as_scoped(&app.whatsapp_api)
        .await;

    let response = app
        .api_client
        .post(format!("{}/table/{}/help", app.get_app_url(), table_id))
        .json(&serde_json::json!({ "kind": "waiter" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();
    let stored: Vec<Notification> = notifications::table.load(&mut conn).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, "call_waiter");
    assert_eq!(stored[0].status, "pending");
    assert_eq!(stored[0].table_id, Some(table_id));
    assert!(stored[0].message.contains("7"));

    let requests = guard.received_requests().await;
    let body = String::from_utf8_lossy(&requests[0].body).into_owned();
    assert!(body.contains("To=whatsapp%3A%2B31600000000"));
}

#[actix_web::test]
async fn help_request_succeeds_even_when_whatsapp_delivery_fails() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], Some("whatsapp:+31600000000"));
    let table_id = app.seed_table(branch_id, 7);

    app.join(&app.api_client, table_id, "Ana").await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.whatsapp_api)
        .await;

    let response = app
        .api_client
        .post(format!("{}/table/{}/help", app.get_app_url(), table_id))
        .json(&serde_json::json!({ "kind": "manager", "message": "The bill seems wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();
    let stored: i64 = notifications::table.count().get_result(&mut conn).unwrap();
    assert_eq!(stored, 1);
}

#[actix_web::test]
async fn no_alert_is_sent_when_the_branch_has_no_staff_number() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 7);

    app.join(&app.api_client, table_id, "Ana").await;

    // Zero expected requests: reaching WhatsApp at all would fail the test
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.whatsapp_api)
        .await;

    let response = app
        .api_client
        .post(format!("{}/table/{}/help", app.get_app_url(), table_id))
        .json(&serde_json::json!({ "kind": "waiter" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();
    let stored: i64 = notifications::table.count().get_result(&mut conn).unwrap();
    assert_eq!(stored, 1);
}
