use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use dinetab::schema::cart_items;
use uuid::Uuid;

use crate::helpers::TestApp;

#[actix_web::test]
async fn added_item_appears_in_the_table_view_with_its_owner() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 4);

    let join_body = app
        .join(&app.api_client, table_id, "Ana")
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let user_id = join_body["user_id"].as_str().unwrap().to_string();

    let response = app
        .add_cart_item(&app.api_client, table_id, "Bitterballen", "6.50", 2)
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let view = app
        .api_client
        .get(format!("{}/table/{}", app.get_app_url(), table_id))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    let items = view["order"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item"]["name"], "Bitterballen");
    assert_eq!(items[0]["item"]["paid"], false);

    let owners = items[0]["owners"].as_array().unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].as_str().unwrap(), user_id);

    assert_eq!(view["order"]["amount_left_to_pay"], "13.00");
}

#[actix_web::test]
async fn adding_an_item_without_joining_is_forbidden() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 4);

    let stranger = TestApp::new_session_client();
    let response = app
        .add_cart_item(&stranger, table_id, "Bitterballen", "6.50", 1)
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn adding_an_item_with_a_non_positive_price_is_rejected() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 4);

    app.join(&app.api_client, table_id, "Ana").await;

    let response = app
        .add_cart_item(&app.api_client, table_id, "Bitterballen", "0.00", 1)
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[actix_web::test]
async fn an_unpaid_item_can_be_removed() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 4);

    app.join(&app.api_client, table_id, "Ana").await;

    let item = app
        .add_cart_item(&app.api_client, table_id, "Bitterballen", "6.50", 1)
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let cart_item_id = item["cart_item_id"].as_str().unwrap();

    let response = app
        .api_client
        .delete(format!(
            "{}/table/{}/cart/{}",
            app.get_app_url(),
            table_id,
            cart_item_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mut conn = app.pool.get().unwrap();
    let remaining: i64 = cart_items::table.count().get_result(&mut conn).unwrap();
    assert_eq!(remaining, 0);
}

#[actix_web::test]
async fn removing_a_settled_item_is_a_conflict() {
    let app = TestApp::spawn_app().await;
    let branch_id = app.seed_branch(vec!["card"], None);
    let table_id = app.seed_table(branch_id, 4);

    app.join(&app.api_client, table_id, "Ana").await;

    let item = app
        .add_cart_item(&app.api_client, table_id, "Bitterballen", "6.50", 1)
        .await
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let cart_item_id = Uuid::parse_str(item["cart_item_id"].as_str().unwrap()).unwrap();

    let mut conn = app.pool.get().unwrap();
    diesel::update(cart_items::table.find(cart_item_id))
        .set((cart_items::paid.eq(true), cart_items::paid_by.eq("Ana")))
        .execute(&mut conn)
        .unwrap();

    let response = app
        .api_client
        .delete(format!(
            "{}/table/{}/cart/{}",
            app.get_app_url(),
            table_id,
            cart_item_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let remaining: i64 = cart_items::table.count().get_result(&mut conn).unwrap();
    assert_eq!(remaining, 1);
}
