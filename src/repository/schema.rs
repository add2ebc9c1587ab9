//! Diesel table definitions (spec §6 "Persisted schema"). Hand-written
//! rather than `diesel print-schema`-generated, matching the teacher's
//! `repository/diesel_models.rs` convention of declaring `table!` blocks
//! alongside the Rust structs that use them.

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::Vector;

    projects (project_id) {
        project_id -> Text,
        project_name -> Text,
        metadata -> Nullable<Jsonb>,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::Vector;

    documents (document_id) {
        document_id -> Text,
        project_id -> Text,
        document_keywords -> Array<Text>,
        document_tags -> Array<Text>,
        document_headings -> Array<Text>,
        document_metadata -> Jsonb,
        embedding -> Nullable<Vector>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::Vector;

    document_chunks (id) {
        id -> Text,
        content -> Text,
        metadata -> Jsonb,
        embedding -> Vector,
        document_id -> Text,
        project_id -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    processing_logs (id) {
        id -> Int8,
        document_id -> Text,
        project_id -> Text,
        status -> Text,
        processed_at -> Timestamptz,
        metrics -> Jsonb,
    }
}

diesel::joinable!(documents -> projects (project_id));
diesel::joinable!(document_chunks -> documents (document_id));
diesel::allow_tables_to_appear_in_same_query!(projects, documents, document_chunks, processing_logs);
