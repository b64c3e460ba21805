/*
 * Copyright 2024 Download Service Contributors
 */

table! {
    approval_entity (id) {
        id -> Uuid,
        request_id -> Uuid,
        entity_geid -> Text,
        entity_type -> Text,
        review_status -> Text,
        parent_geid -> Nullable<Text>,
        copy_status -> Text,
        name -> Text,
    }
}
