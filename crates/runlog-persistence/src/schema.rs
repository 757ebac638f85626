//! Esquema Diesel (declarado manualmente; el DDL idempotente vive en `db`).

diesel::table! {
    workflows (id) {
        id -> Text,
        source_file -> Nullable<Text>,
        started_at -> Timestamp,
        end_time -> Nullable<Timestamp>,
        status -> Text,
        command_line -> Nullable<Text>,
        dryrun -> Bool,
        rulegraph_data -> Nullable<Text>,
    }
}

diesel::table! {
    rules (id) {
        id -> Integer,
        workflow_id -> Text,
        name -> Text,
    }
}

diesel::table! {
    groups (id) {
        id -> Integer,
        workflow_id -> Text,
        external_id -> BigInt,
        status -> Text,
        started_at -> Nullable<Timestamp>,
        end_time -> Nullable<Timestamp>,
    }
}

diesel::table! {
    jobs (id) {
        id -> Integer,
        workflow_id -> Text,
        rule_id -> Nullable<Integer>,
        group_id -> Nullable<Integer>,
        external_id -> BigInt,
        status -> Text,
        started_at -> Nullable<Timestamp>,
        end_time -> Nullable<Timestamp>,
        shell_command -> Nullable<Text>,
        resources -> Nullable<Text>,
    }
}

diesel::table! {
    errors (id) {
        id -> Integer,
        workflow_id -> Text,
        message -> Text,
        traceback -> Nullable<Text>,
        job_id -> Nullable<Integer>,
        group_id -> Nullable<Integer>,
        created_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    workflows,
    rules,
    groups,
    jobs,
    errors,
);
