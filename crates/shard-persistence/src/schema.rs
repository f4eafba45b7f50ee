// Esquema Diesel del store principal. `block` y `transaction` también
// describen las tablas de cada store de shard (mismas columnas).
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    block (db_id) {
        db_id -> BigInt,
        id -> BigInt,
        height -> Integer,
        version -> Integer,
        timestamp -> Integer,
        timeout -> Integer,
        previous_block_id -> BigInt,
        generator_id -> BigInt,
        block_signature -> Binary,
        payload_hash -> Binary,
    }
}
diesel::table! {
    transaction (db_id) {
        db_id -> BigInt,
        id -> BigInt,
        height -> Integer,
        block_id -> BigInt,
        transaction_index -> SmallInt,
        full_hash -> Binary,
        signature -> Binary,
        attachment -> Text,
    }
}
diesel::table! {
    phasing_poll (db_id) {
        db_id -> BigInt,
        transaction_id -> BigInt,
        height -> Integer,
        finish_height -> Integer,
    }
}
diesel::table! {
    block_index (block_id) {
        block_id -> BigInt,
        block_height -> Integer,
    }
}
diesel::table! {
    transaction_shard_index (transaction_id) {
        transaction_id -> BigInt,
        partial_transaction_hash -> Binary,
        transaction_index -> SmallInt,
        height -> Integer,
    }
}
diesel::table! {
    shard (shard_id) {
        shard_id -> BigInt,
        shard_height -> Integer,
        shard_hash -> Nullable<Binary>,
        shard_state -> Integer,
        archive_hash -> Nullable<Binary>,
        generator_ids -> Text,
        block_timeouts -> Text,
        block_timestamps -> Text,
    }
}
diesel::table! {
    migration_state (shard_id) {
        shard_id -> BigInt,
        target_height -> Integer,
        start_height -> Integer,
        checkpoint -> Text,
        status -> Text,
        failed_step -> Nullable<Text>,
        updated_at_ts -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(block,
                                      transaction,
                                      phasing_poll,
                                      block_index,
                                      transaction_shard_index,
                                      shard,
                                      migration_state);
