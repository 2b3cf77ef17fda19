use parse_schema_sync::reconcile::{FailurePolicy, ReconcileOptions};
use parse_schema_sync::schema::{ClassLevelPermissions, ClassSchema, FieldChange, FieldSpec, FieldType};
use parse_schema_sync::store;
use parse_schema_sync::sync::{self, DeleteOptions, UpOptions};
use parse_schema_sync::ParseError;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

mod sync_test_utils;
use sync_test_utils::shared::{Call, MockParseServer};

fn user_class() -> ClassSchema {
    ClassSchema::new("User")
        .with_field("name", FieldSpec::new(FieldType::String).required(true))
        .with_permissions(ClassLevelPermissions::public("*"))
}

async fn local_schema(classes: &[ClassSchema]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classes");
    store::write_all(&path, classes).await.unwrap();
    (dir, path)
}

#[tokio::test]
async fn test_new_field_is_added_with_a_single_update() {
    let server = MockParseServer::with_classes(vec![user_class()]);
    let local = user_class().with_field("age", FieldSpec::new(FieldType::Number));
    let (_dir, path) = local_schema(&[local.clone()]).await;

    let report = sync::up(&server, &path, &UpOptions::default())
        .await
        .expect("up failed");

    assert!(report.is_success());
    let calls = server.mutating_calls();
    assert_eq!(calls.len(), 1, "unexpected calls: {:?}", calls);
    match &calls[0] {
        Call::UpdateClass(update) => {
            assert_eq!(update.class_name, "User");
            assert_eq!(
                update.fields.get("age"),
                Some(&FieldChange::Set(FieldSpec::new(FieldType::Number)))
            );
            assert_eq!(update.fields.len(), 1);
            assert_eq!(update.class_level_permissions, ClassLevelPermissions::public("*"));
        }
        other => panic!("expected an update call, got {:?}", other),
    }
    assert_eq!(server.class("User"), Some(local));
}

#[tokio::test]
async fn test_second_run_makes_no_changes() {
    let server = MockParseServer::with_classes(vec![ClassSchema::new("Stale")]);
    let game = ClassSchema::new("Game")
        .with_field("owner", FieldSpec::pointer("_User"))
        .with_field("players", FieldSpec::relation("_User"))
        .with_field("score", FieldSpec::new(FieldType::Number).with_default(json!(0)));
    let (_dir, path) = local_schema(&[game, user_class()]).await;

    let first = sync::up(&server, &path, &UpOptions::default()).await.unwrap();
    assert_eq!(
        first.applied,
        vec![
            "create class Game (3 fields)",
            "create class User (1 fields)",
            "delete class Stale",
        ]
    );

    server.clear_calls();
    let second = sync::up(&server, &path, &UpOptions::default()).await.unwrap();
    assert!(second.applied.is_empty());
    assert!(server.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_changed_field_type_is_deleted_then_recreated() {
    let remote = ClassSchema::new("Game").with_field("score", FieldSpec::new(FieldType::String));
    let server = MockParseServer::with_classes(vec![remote]);
    let local = ClassSchema::new("Game").with_field("score", FieldSpec::new(FieldType::Number));
    let (_dir, path) = local_schema(&[local.clone()]).await;

    sync::up(&server, &path, &UpOptions::default()).await.unwrap();

    let calls = server.mutating_calls();
    assert_eq!(calls.len(), 2);
    match (&calls[0], &calls[1]) {
        (Call::UpdateClass(first), Call::UpdateClass(second)) => {
            assert_eq!(first.deleted_fields().collect::<Vec<_>>(), vec!["score"]);
            assert_eq!(second.set_fields().count(), 1);
        }
        other => panic!("unexpected calls: {:?}", other),
    }
    assert_eq!(server.class("Game"), Some(local));
}

#[tokio::test]
async fn test_obsolete_class_is_deleted_only_when_allowed() {
    let (_dir, path) = local_schema(&[user_class()]).await;

    let server = MockParseServer::with_classes(vec![user_class(), ClassSchema::new("Obsolete")]);
    sync::up(&server, &path, &UpOptions::default()).await.unwrap();
    assert_eq!(
        server.mutating_calls(),
        vec![Call::DeleteClass("Obsolete".to_string())]
    );

    let server = MockParseServer::with_classes(vec![user_class(), ClassSchema::new("Obsolete")]);
    let options = UpOptions {
        reconcile: ReconcileOptions {
            delete_classes: false,
            ..ReconcileOptions::default()
        },
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();
    assert!(server.mutating_calls().is_empty());
    assert_eq!(report.warnings, vec!["Skip deleting class: Obsolete"]);
}

#[tokio::test]
async fn test_safe_mode_never_deletes() {
    let remote = user_class()
        .with_field("legacy", FieldSpec::new(FieldType::Object))
        .with_field("rank", FieldSpec::new(FieldType::String));
    let server = MockParseServer::with_classes(vec![remote, ClassSchema::new("Obsolete")]);
    let local = user_class()
        .with_field("rank", FieldSpec::new(FieldType::Number))
        .with_field("email", FieldSpec::new(FieldType::String));
    let (_dir, path) = local_schema(&[local]).await;

    let options = UpOptions {
        reconcile: ReconcileOptions::safe(),
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();

    for call in server.mutating_calls() {
        match call {
            Call::UpdateClass(update) => assert_eq!(update.deleted_fields().count(), 0),
            Call::DeleteClass(name) => panic!("safe mode dropped class {}", name),
            _ => {}
        }
    }
    let user = server.class("User").unwrap();
    assert!(user.fields.contains_key("legacy"));
    assert!(user.fields.contains_key("email"));
    assert_eq!(user.fields["rank"], FieldSpec::new(FieldType::String));
    assert!(server.class("Obsolete").is_some());
    assert!(report
        .warnings
        .contains(&"Can't update field: User.rank".to_string()));
}

#[tokio::test]
async fn test_ignored_classes_are_left_alone() {
    let server = MockParseServer::with_classes(vec![
        ClassSchema::new("TempImport"),
        ClassSchema::new("AuditLog"),
        ClassSchema::new("Keep"),
    ]);
    let (_dir, path) = local_schema(&[ClassSchema::new("Keep"), ClassSchema::new("TempLocal")]).await;

    let options = UpOptions {
        ignore: vec!["Temp*".to_string(), "*Log".to_string()],
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();

    assert!(report.applied.is_empty());
    assert!(server.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_non_empty_class_requires_purge() {
    let (_dir, path) = local_schema(&[]).await;

    let server = MockParseServer::with_classes(vec![ClassSchema::new("Obsolete")]);
    server.add_objects("Obsolete", 3);
    let result = sync::up(&server, &path, &UpOptions::default()).await;
    match result {
        Err(ParseError::ApiError { code, .. }) => assert_eq!(code, 255),
        other => panic!("expected ApiError, got {:?}", other),
    }
    assert!(server.class("Obsolete").is_some());

    let options = UpOptions {
        reconcile: ReconcileOptions {
            delete_non_empty_class: true,
            ..ReconcileOptions::default()
        },
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();
    assert_eq!(report.applied, vec!["purge objects of Obsolete and delete class"]);
    assert_eq!(server.object_count("Obsolete"), 0);
    assert!(server.class("Obsolete").is_none());
}

#[tokio::test]
async fn test_purge_collects_every_page_before_deleting() {
    let (_dir, path) = local_schema(&[]).await;
    let server = MockParseServer::with_classes(vec![ClassSchema::new("Big")]);
    server.add_objects("Big", 2500);

    let options = UpOptions {
        reconcile: ReconcileOptions {
            delete_non_empty_class: true,
            ..ReconcileOptions::default()
        },
        ..UpOptions::default()
    };
    sync::up(&server, &path, &options).await.unwrap();

    let pages: Vec<usize> = server
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::ListObjects { skip, .. } => Some(skip),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![0, 1000, 2000, 2500]);
    assert!(server.class("Big").is_none());
}

#[tokio::test]
async fn test_purge_follows_server_page_cap() {
    let (_dir, path) = local_schema(&[]).await;
    let server = MockParseServer::with_classes(vec![ClassSchema::new("Capped")]);
    server.set_max_limit(100);
    server.add_objects("Capped", 250);

    let options = UpOptions {
        reconcile: ReconcileOptions {
            delete_non_empty_class: true,
            ..ReconcileOptions::default()
        },
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();

    let pages: Vec<usize> = server
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::ListObjects { skip, .. } => Some(skip),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![0, 100, 200, 250]);
    assert_eq!(report.applied, vec!["purge objects of Capped and delete class"]);
    assert_eq!(server.object_count("Capped"), 0);
    assert!(server.class("Capped").is_none());
}

#[tokio::test]
async fn test_failure_policy_abort_and_continue() {
    let (_dir, path) = local_schema(&[
        ClassSchema::new("Alpha"),
        ClassSchema::new("Beta"),
        ClassSchema::new("Gamma"),
    ])
    .await;

    let server = MockParseServer::new();
    server.fail_requests_for("Beta");
    let result = sync::up(&server, &path, &UpOptions::default()).await;
    assert!(matches!(result, Err(ParseError::ApiError { status: 500, .. })));
    assert_eq!(server.class_names(), vec!["Alpha"]);

    let server = MockParseServer::new();
    server.fail_requests_for("Beta");
    let options = UpOptions {
        reconcile: ReconcileOptions {
            failure_policy: FailurePolicy::Continue,
            ..ReconcileOptions::default()
        },
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].class_name, "Beta");
    assert_eq!(server.class_names(), vec!["Alpha", "Gamma"]);
}

#[tokio::test]
async fn test_prefix_scopes_push_and_keeps_system_classes() {
    let server = MockParseServer::with_classes(vec![
        ClassSchema::new("_Role"),
        ClassSchema::new("Other_Game"),
        ClassSchema::new("Test_Old"),
    ]);
    let game = ClassSchema::new("Game").with_field("level", FieldSpec::pointer("{{PREFIX}}Level"));
    let (_dir, path) = local_schema(&[game, ClassSchema::new("Level")]).await;

    let options = UpOptions {
        prefix: Some("Test_".to_string()),
        ..UpOptions::default()
    };
    let report = sync::up(&server, &path, &options).await.unwrap();

    assert_eq!(
        report.applied,
        vec![
            "create class Test_Game (1 fields)",
            "create class Test_Level (0 fields)",
            "delete class Test_Old",
        ]
    );
    let created = server.class("Test_Game").unwrap();
    assert_eq!(
        created.fields["level"].target_class.as_deref(),
        Some("Test_Level")
    );
    assert!(server.class("_Role").is_some());
    assert!(server.class("Other_Game").is_some());
}

#[tokio::test]
async fn test_unprefixed_reference_is_reported() {
    let server = MockParseServer::new();
    let game = ClassSchema::new("Game").with_field("level", FieldSpec::pointer("Level"));
    let (_dir, path) = local_schema(&[game, ClassSchema::new("Level")]).await;

    let options = UpOptions {
        prefix: Some("Test_".to_string()),
        ..UpOptions::default()
    };
    let plan = sync::plan_up(&server, &path, &options).await.unwrap();
    assert_eq!(plan.warnings.len(), 1);
    assert!(plan.warnings[0].starts_with("Game.level targets 'Level'"));
    assert!(server.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_delete_drops_local_classes_only() {
    let server = MockParseServer::with_classes(vec![
        ClassSchema::new("_User"),
        ClassSchema::new("App_Game"),
        ClassSchema::new("App_Other"),
    ]);
    server.add_objects("App_Game", 2);
    let (_dir, path) = local_schema(&[ClassSchema::new("_User"), ClassSchema::new("Game")]).await;

    let options = DeleteOptions {
        prefix: Some("App_".to_string()),
        delete_non_empty_class: true,
        ..DeleteOptions::default()
    };
    let report = sync::delete(&server, &path, &options).await.unwrap();

    assert_eq!(report.applied, vec!["purge objects of App_Game and delete class"]);
    assert_eq!(server.class_names(), vec!["App_Other", "_User"]);
}

#[tokio::test]
async fn test_missing_local_schema_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockParseServer::new();
    let result = sync::up(&server, &dir.path().join("nothing"), &UpOptions::default()).await;
    assert!(matches!(result, Err(ParseError::NotFound(_))));
    assert!(server.calls().is_empty());
}
