use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use dinetab::{
    models::{Payment, User},
    schema::{cart_items, orders, payments, users},
};
use rust_decimal::Decimal;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

use crate::helpers::{checkout_completed_event, TestApp, TEST_WEBHOOK_SECRET};

struct SeatedDiner {
    table_id: Uuid,
    branch_id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
}

async fn seat_diner(app: &TestApp) -> SeatedDiner {
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 4);

    let body = app
        .join(&app.api_client, table_id, "Ana")
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();

    SeatedDiner {
        table_id,
        branch_id,
        order_id: Uuid::parse_str(body["order_id"].as_str().unwrap()).unwrap(),
        user_id: Uuid::parse_str(body["user_id"].as_str().unwrap()).unwrap(),
    }
}

fn decimal(value: &str) -> Decimal {
    value.parse().unwrap()
}

#[actix_web::test]
async fn paying_the_full_bill_creates_a_checkout_session_with_the_metadata_bag() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    app.add_cart_item(&app.api_client, diner.table_id, "Rib-eye", "100.00", 1)
        .await;

    let guard = Mock::given(path("/v1/checkout/sessions"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.test/pay/cs_test_1"
        })))
        .expect(1)
        .mount_as_scoped(&app.stripe_api)
        .await;

    let response = app
        .api_client
        .post(format!("{}/table/{}/pay", app.get_app_url(), diner.table_id))
        .json(&serde_json::json!({
            "mode": "fullBill",
            "tipPercentage": 10,
            "method": "card"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(
        body["checkout_url"].as_str().unwrap(),
        "https://checkout.stripe.test/pay/cs_test_1"
    );

    let requests = guard.received_requests().await;
    let form_body = String::from_utf8_lossy(&requests[0].body).into_owned();
    // 100.00 + 10% tip, in minor units
    assert!(form_body.contains("unit_amount%5D=11000"));
    assert!(form_body.contains("metadata%5BtypeOfPayment%5D=fullpay"));
    assert!(form_body.contains("metadata%5BisOrderAmountFullPaid%5D=true"));

    // Nothing settles until the provider's webhook confirms it
    let mut conn = app.pool.get().unwrap();
    let payment_count: i64 = payments::table.count().get_result(&mut conn).unwrap();
    assert_eq!(payment_count, 0);
}

#[actix_web::test]
async fn paying_with_a_method_the_branch_rejects_is_a_bad_request() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    app.add_cart_item(&app.api_client, diner.table_id, "Rib-eye", "100.00", 1)
        .await;

    let response = app
        .api_client
        .post(format!("{}/table/{}/pay", app.get_app_url(), diner.table_id))
        .json(&serde_json::json!({
            "mode": "fullBill",
            "tipPercentage": 0,
            "method": "ideal"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[actix_web::test]
async fn full_bill_webhook_settles_the_order_and_ends_it() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    app.add_cart_item(&app.api_client, diner.table_id, "Rib-eye", "100.00", 1)
        .await;

    // Order total 100.00, tip 10% -> amount_total 110.00
    let event = checkout_completed_event(
        "pi_full_1",
        diner.order_id,
        diner.branch_id,
        diner.user_id,
        "fullpay",
        11000,
        "10.00",
        true,
        &serde_json::json!([]),
    );

    let response = app.post_webhook(&event).await;
    assert_eq!(response.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();

    let payment: Payment = payments::table
        .filter(payments::intent_id.eq("pi_full_1"))
        .first(&mut conn)
        .unwrap();
    assert_eq!(payment.amount, decimal("100.00"));
    assert_eq!(payment.tip, decimal("10.00"));
    assert_eq!(payment.total, decimal("110.00"));
    assert_eq!(payment.status, "accepted");
    assert_eq!(payment.order_id, diner.order_id);
    assert_eq!(payment.user_id, diner.user_id);

    let (active, paid, paid_date, tip): (bool, bool, Option<chrono::DateTime<chrono::Utc>>, Decimal) =
        orders::table
            .find(diner.order_id)
            .select((orders::active, orders::paid, orders::paid_date, orders::tip))
            .first(&mut conn)
            .unwrap();
    assert!(!active);
    assert!(paid);
    assert!(paid_date.is_some());
    assert_eq!(tip, decimal("10.00"));

    let payer: User = users::table.find(diner.user_id).first(&mut conn).unwrap();
    assert_eq!(payer.paid, decimal("100.00"));
    assert_eq!(payer.tip, decimal("10.00"));
    assert_eq!(payer.total, payer.paid + payer.tip);
}

#[actix_web::test]
async fn duplicate_webhook_delivery_settles_exactly_once() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    let first_item = app
        .add_cart_item(&app.api_client, diner.table_id, "Soep", "10.00", 1)
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let second_item = app
        .add_cart_item(&app.api_client, diner.table_id, "Salade", "15.00", 1)
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();

    let extra_data = serde_json::json!([
        { "itemId": first_item["cart_item_id"], "price": "10.00" },
        { "itemId": second_item["cart_item_id"], "price": "15.00" }
    ]);

    let event = checkout_completed_event(
        "pi_dish_1",
        diner.order_id,
        diner.branch_id,
        diner.user_id,
        "perDish",
        2500,
        "0.00",
        false,
        &extra_data,
    );

    // The provider delivers at least once; here it delivers twice
    let first_delivery = app.post_webhook(&event).await;
    assert_eq!(first_delivery.status().as_u16(), 200);
    let second_delivery = app.post_webhook(&event).await;
    assert_eq!(second_delivery.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();

    let payment_count: i64 = payments::table
        .filter(payments::intent_id.eq("pi_dish_1"))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(payment_count, 1);

    let payer: User = users::table.find(diner.user_id).first(&mut conn).unwrap();
    assert_eq!(payer.paid, decimal("25.00"));
    assert_eq!(payer.total, payer.paid + payer.tip);

    let settled: Vec<(bool, Option<String>)> = cart_items::table
        .filter(cart_items::order_id.eq(diner.order_id))
        .select((cart_items::paid, cart_items::paid_by))
        .load(&mut conn)
        .unwrap();
    assert_eq!(settled.len(), 2);
    for (paid, paid_by) in settled {
        assert!(paid);
        assert_eq!(paid_by.as_deref(), Some("Ana"));
    }

    // Partial settlement leaves the order open
    let active: bool = orders::table
        .find(diner.order_id)
        .select(orders::active)
        .first(&mut conn)
        .unwrap();
    assert!(active);
}

#[actix_web::test]
async fn webhook_with_a_bad_signature_is_rejected() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    let event = checkout_completed_event(
        "pi_forged",
        diner.order_id,
        diner.branch_id,
        diner.user_id,
        "fullpay",
        11000,
        "10.00",
        true,
        &serde_json::json!([]),
    );

    let response = app
        .api_client
        .post(format!("{}/webhooks/stripe", app.get_app_url()))
        .header("Stripe-Signature", "not-the-secret")
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let missing_header = app
        .api_client
        .post(format!("{}/webhooks/stripe", app.get_app_url()))
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(missing_header.status().as_u16(), 400);

    let mut conn = app.pool.get().unwrap();
    let payment_count: i64 = payments::table.count().get_result(&mut conn).unwrap();
    assert_eq!(payment_count, 0);
}

#[actix_web::test]
async fn an_expired_checkout_session_mutates_nothing() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    let event = serde_json::json!({
        "id": "evt_expired_1",
        "type": "checkout.session.expired",
        "data": {
            "object": {
                "id": "cs_expired_1",
                "payment_intent": null,
                "payment_status": "unpaid",
                "amount_total": 11000,
                "metadata": {}
            }
        }
    });

    let response = app
        .api_client
        .post(format!("{}/webhooks/stripe", app.get_app_url()))
        .header("Stripe-Signature", TEST_WEBHOOK_SECRET)
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();
    let payment_count: i64 = payments::table.count().get_result(&mut conn).unwrap();
    assert_eq!(payment_count, 0);

    let payer: User = users::table.find(diner.user_id).first(&mut conn).unwrap();
    assert_eq!(payer.paid, Decimal::ZERO);
}

#[actix_web::test]
async fn concurrent_payments_by_different_diners_both_count() {
    let app = TestApp::spawn_app().await;
    let diner = seat_diner(&app).await;

    let second_client = TestApp::new_session_client();
    let second_body = app
        .join(&second_client, diner.table_id, "Bram")
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let second_user = Uuid::parse_str(second_body["user_id"].as_str().unwrap()).unwrap();

    app.add_cart_item(&app.api_client, diner.table_id, "Rib-eye", "100.00", 1)
        .await;

    let first_event = checkout_completed_event(
        "pi_split_a",
        diner.order_id,
        diner.branch_id,
        diner.user_id,
        "perDish",
        5000,
        "0.00",
        false,
        &serde_json::json!([]),
    );
    let second_event = checkout_completed_event(
        "pi_split_b",
        diner.order_id,
        diner.branch_id,
        second_user,
        "perDish",
        5000,
        "0.00",
        false,
        &serde_json::json!([]),
    );

    let (first, second) = futures_util::future::join(
        app.post_webhook(&first_event),
        app.post_webhook(&second_event),
    )
    .await;
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();
    let payment_count: i64 = payments::table
        .filter(payments::order_id.eq(diner.order_id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(payment_count, 2);

    let balances: Vec<Decimal> = users::table
        .filter(users::order_id.eq(diner.order_id))
        .select(users::paid)
        .load(&mut conn)
        .unwrap();
    assert_eq!(balances, vec![decimal("50.00"), decimal("50.00")]);
}
