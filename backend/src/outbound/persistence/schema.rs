//! Diesel table definitions mirroring `migrations/`.
//!
//! Keep in step with the SQL by hand or with `diesel print-schema`. The
//! foreign keys target `wp_users.wp_user_id`, which is not the primary key,
//! so no `joinable!` declarations are emitted.

diesel::table! {
    /// WordPress accounts mirrored on login.
    wp_users (id) {
        id -> Int4,
        /// External WordPress id; unique.
        wp_user_id -> Int4,
        email -> Varchar,
        username -> Nullable<Varchar>,
        display_name -> Nullable<Varchar>,
        roles -> Nullable<Jsonb>,
        capabilities -> Nullable<Jsonb>,
        wp_token -> Nullable<Text>,
        wp_token_expires -> Nullable<Varchar>,
        last_login -> Nullable<Timestamptz>,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Per-user query counters. No dedup key.
    api_usage (id) {
        id -> Int4,
        wp_user_id -> Nullable<Int4>,
        email -> Varchar,
        queries -> Nullable<Int4>,
        last_query -> Nullable<Timestamptz>,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Append-only query log.
    query_history (id) {
        id -> Int4,
        wp_user_id -> Nullable<Int4>,
        email -> Varchar,
        query_type -> Nullable<Varchar>,
        query_data -> Nullable<Jsonb>,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// WooCommerce order snapshots.
    wc_orders (id) {
        id -> Int4,
        wc_order_id -> Int4,
        wp_user_id -> Nullable<Int4>,
        wc_customer_id -> Nullable<Int4>,
        status -> Nullable<Varchar>,
        total -> Nullable<Numeric>,
        subtotal -> Nullable<Numeric>,
        tax_total -> Nullable<Numeric>,
        currency -> Nullable<Varchar>,
        date_created -> Nullable<Timestamptz>,
        date_completed -> Nullable<Timestamptz>,
        product_count -> Nullable<Int4>,
        /// JSON array of product names.
        product_names -> Nullable<Jsonb>,
        billing_email -> Nullable<Varchar>,
        billing_phone -> Nullable<Varchar>,
        shipping_method -> Nullable<Varchar>,
        payment_method -> Nullable<Varchar>,
        synced_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// WooCommerce product snapshots.
    wc_products (id) {
        id -> Int4,
        wc_product_id -> Int4,
        name -> Nullable<Varchar>,
        slug -> Nullable<Varchar>,
        status -> Nullable<Varchar>,
        #[sql_name = "type"]
        product_type -> Nullable<Varchar>,
        description -> Nullable<Text>,
        short_description -> Nullable<Text>,
        sku -> Nullable<Varchar>,
        price -> Nullable<Numeric>,
        regular_price -> Nullable<Numeric>,
        sale_price -> Nullable<Numeric>,
        stock_status -> Nullable<Varchar>,
        stock_quantity -> Nullable<Int4>,
        categories -> Nullable<Jsonb>,
        tags -> Nullable<Jsonb>,
        images -> Nullable<Jsonb>,
        date_created -> Nullable<Timestamptz>,
        date_modified -> Nullable<Timestamptz>,
        synced_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Login sessions, loosely linked to users.
    user_sessions (id) {
        id -> Int4,
        wp_user_id -> Nullable<Int4>,
        last_login -> Nullable<Timestamptz>,
        session_data -> Nullable<Jsonb>,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    wp_users,
    api_usage,
    query_history,
    wc_orders,
    wc_products,
    user_sessions,
);
