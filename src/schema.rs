diesel::table! {
    branches (branch_id) {
        branch_id -> Uuid,
        name -> Text,
        accepted_methods -> Array<Text>,
        staff_number -> Nullable<Text>,
    }
}

diesel::table! {
    tables (table_id) {
        table_id -> Uuid,
        branch_id -> Uuid,
        number -> Int4,
        seats -> Int4,
        order_id -> Nullable<Uuid>,
    }
}

diesel::table! {
    orders (order_id) {
        order_id -> Uuid,
        table_id -> Nullable<Uuid>,
        branch_id -> Uuid,
        active -> Bool,
        paid -> Bool,
        paid_date -> Nullable<Timestamptz>,
        tip -> Numeric,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (user_id) {
        user_id -> Uuid,
        name -> Text,
        color -> Text,
        table_id -> Nullable<Uuid>,
        order_id -> Nullable<Uuid>,
        paid -> Numeric,
        tip -> Numeric,
        total -> Numeric,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    cart_items (cart_item_id) {
        cart_item_id -> Uuid,
        order_id -> Uuid,
        product_id -> Uuid,
        name -> Text,
        price -> Numeric,
        quantity -> Int4,
        paid -> Bool,
        paid_by -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    cart_item_owners (cart_item_id, user_id) {
        cart_item_id -> Uuid,
        user_id -> Uuid,
    }
}

diesel::table! {
    payments (payment_id) {
        payment_id -> Uuid,
        intent_id -> Text,
        order_id -> Uuid,
        branch_id -> Uuid,
        user_id -> Uuid,
        method -> Text,
        amount -> Numeric,
        tip -> Numeric,
        total -> Numeric,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (notification_id) {
        notification_id -> Uuid,
        branch_id -> Uuid,
        table_id -> Nullable<Uuid>,
        user_id -> Nullable<Uuid>,
        kind -> Text,
        message -> Text,
        method -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(tables -> branches (branch_id));
diesel::joinable!(cart_item_owners -> cart_items (cart_item_id));
diesel::joinable!(cart_item_owners -> users (user_id));
diesel::joinable!(payments -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    branches,
    tables,
    orders,
    users,
    cart_items,
    cart_item_owners,
    payments,
    notifications,
);
