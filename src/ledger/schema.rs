diesel::table! {
    events (id) {
        id -> BigInt,
        kind -> Text,
        actor_id -> Text,
        channel_id -> Text,
        created_at -> BigInt,
        message_id -> Nullable<Text>,
        message_state -> Text,
        customer_name -> Text,
        set_at -> Nullable<BigInt>,
        has_bill -> Nullable<Bool>,
        system_size -> Nullable<Double>,
        setter_id -> Nullable<Text>,
    }
}
