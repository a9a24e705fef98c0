mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{authed, create_task, init_app, register, MultipartBody, TestContext};

fn file_ids(task: &Value) -> Vec<String> {
    task["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().to_string())
        .collect()
}

fn file_keys(task: &Value) -> Vec<String> {
    task["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["key"].as_str().unwrap().to_string())
        .collect()
}

#[actix_rt::test]
async fn test_create_task_json_and_multipart() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "creator@example.com").await;

    let req = authed(test::TestRequest::post().uri("/api/tasks"), &token)
        .set_json(json!({ "title": "Plain task", "description": "no files" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let task: Value = test::read_body_json(resp).await;
    assert_eq!(task["title"], "Plain task");
    assert_eq!(task["done"], false);
    assert_eq!(task["files"], json!([]));
    assert!(task["userId"].is_string());
    assert!(task["createdAt"].is_string());

    let task = create_task(&app, &token, "With files", &["a.png", "b c.png"]).await;
    let keys = file_keys(&task);
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.starts_with("task-images/")));
    assert!(keys.iter().any(|k| k.ends_with("-b_c.png")));
    for file in task["files"].as_array().unwrap() {
        assert_eq!(
            file["url"].as_str().unwrap(),
            format!("memory://blobs/{}", file["key"].as_str().unwrap())
        );
    }
}

#[actix_rt::test]
async fn test_create_task_validation() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "short@example.com").await;

    let req = authed(test::TestRequest::post().uri("/api/tasks"), &token)
        .set_json(json!({ "title": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["path"], "title");

    let req = MultipartBody::new()
        .text("title", "Bad upload")
        .file("files", "notes.txt", "text/plain", b"hello")
        .into_request(authed(test::TestRequest::post().uri("/api/tasks"), &token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.repo.task_count(), 0);
    assert!(ctx.blobs.is_empty());
}

#[actix_rt::test]
async fn test_create_task_is_removed_when_upload_fails() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "unlucky@example.com").await;
    ctx.blobs.fail_puts(true);

    let req = MultipartBody::new()
        .text("title", "Doomed upload")
        .png("files", "a.png")
        .into_request(authed(test::TestRequest::post().uri("/api/tasks"), &token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ctx.repo.task_count(), 0);
    assert!(ctx.blobs.is_empty());
}

#[actix_rt::test]
async fn test_get_tasks_is_owner_scoped_newest_first() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let alice = register(&app, "alice@example.com").await;
    let bob = register(&app, "bob@example.com").await;

    create_task(&app, &alice, "First", &[]).await;
    create_task(&app, &alice, "Second", &["s.png"]).await;
    create_task(&app, &bob, "Bob's", &[]).await;

    let req = authed(test::TestRequest::get().uri("/api/tasks"), &alice).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks: Vec<Value> = test::read_body_json(resp).await;
    let titles: Vec<&str> = tasks.iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Second", "First"]);
    assert_eq!(tasks[0]["files"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn test_foreign_task_is_forbidden() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let alice = register(&app, "owner@example.com").await;
    let bob = register(&app, "intruder@example.com").await;

    let task = create_task(&app, &alice, "Private", &["p.png"]).await;
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
    let blobs_before = ctx.blobs.len();

    let requests = vec![
        test::TestRequest::get().uri(&uri),
        test::TestRequest::patch().uri(&uri).set_json(json!({ "title": "Mine now" })),
        test::TestRequest::delete().uri(&uri),
        MultipartBody::new()
            .text("title", "Mine now")
            .png("files", "sneaky.png")
            .into_request(test::TestRequest::put().uri(&uri)),
    ];
    for req in requests {
        let resp = test::call_service(&app, authed(req, &bob).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "User does not have access to this resource");
    }

    // Nothing was uploaded or removed on behalf of the intruder.
    assert_eq!(ctx.blobs.len(), blobs_before);
    assert_eq!(ctx.blobs.delete_calls(), 0);
    assert_eq!(ctx.repo.task_count(), 1);
}

#[actix_rt::test]
async fn test_missing_task_is_not_found() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "finder@example.com").await;

    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let uri = format!("/api/tasks/{}", id);
        for req in [
            test::TestRequest::get().uri(&uri),
            test::TestRequest::delete().uri(&uri),
        ] {
            let resp = test::call_service(&app, authed(req, &token).to_request()).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }
}

#[actix_rt::test]
async fn test_patch_reconciles_files() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "editor@example.com").await;

    let task = create_task(&app, &token, "Gallery", &["a.png", "b.png", "c.png"]).await;
    let ids = file_ids(&task);
    let keys = file_keys(&task);
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    // Keep `b` (sent quoted, the way some form clients do) and add `f`.
    let req = MultipartBody::new()
        .text("existingFileIds[]", &format!("\"{}\"", ids[1]))
        .text("done", "true")
        .png("files[]", "f.png")
        .into_request(authed(test::TestRequest::patch().uri(&uri), &token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;

    assert_eq!(updated["title"], "Gallery");
    assert_eq!(updated["done"], true);
    let new_keys = file_keys(&updated);
    assert_eq!(new_keys.len(), 2);
    assert!(new_keys.contains(&keys[1]));
    assert!(new_keys.iter().any(|k| k.ends_with("-f.png")));
    assert!(!ctx.blobs.contains(&keys[0]));
    assert!(!ctx.blobs.contains(&keys[2]));
    assert_eq!(ctx.blobs.delete_calls(), 2);
    assert_eq!(ctx.repo.attachment_count(), 2);
}

#[actix_rt::test]
async fn test_full_keep_list_leaves_files_unchanged() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "keeper@example.com").await;

    let task = create_task(&app, &token, "Keep all", &["a.png", "b.png"]).await;
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let req = authed(test::TestRequest::put().uri(&uri), &token)
        .set_json(json!({
            "title": "Keep all, renamed",
            "existingFileIds": serde_json::to_string(&file_ids(&task)).unwrap(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;

    assert_eq!(updated["title"], "Keep all, renamed");
    let mut before = file_ids(&task);
    let mut after = file_ids(&updated);
    before.sort();
    after.sort();
    assert_eq!(before, after);
    assert_eq!(ctx.blobs.delete_calls(), 0);
}

#[actix_rt::test]
async fn test_put_requires_title() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "putter@example.com").await;

    let task = create_task(&app, &token, "Needs title", &[]).await;
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let req = authed(test::TestRequest::put().uri(&uri), &token)
        .set_json(json!({ "done": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["path"], "title");

    let req = authed(test::TestRequest::patch().uri(&uri), &token)
        .set_json(json!({ "done": "true" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Needs title");
    assert_eq!(body["done"], true);
}

#[actix_rt::test]
async fn test_get_all_tasks_paginates() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let alice = register(&app, "pager-a@example.com").await;
    let bob = register(&app, "pager-b@example.com").await;

    for i in 1..=12 {
        let token = if i % 2 == 0 { &alice } else { &bob };
        create_task(&app, token, &format!("Task {}", i), &[]).await;
    }

    let req = authed(
        test::TestRequest::get().uri("/api/tasks/all?page=2&tasksPerPage=5"),
        &alice,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["taskTotalCount"], 12);
    let titles: Vec<&str> = page["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Task 6", "Task 7", "Task 8", "Task 9", "Task 10"]);

    let req = authed(test::TestRequest::get().uri("/api/tasks/all?pageSize=20"), &alice)
        .to_request();
    let page: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(page["tasks"].as_array().unwrap().len(), 12);

    let req = authed(
        test::TestRequest::get().uri("/api/tasks/all?page=9223372036854775807&tasksPerPage=100"),
        &alice,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["tasks"], json!([]));
    assert_eq!(page["taskTotalCount"], 12);

    for query in ["page=0", "tasksPerPage=0", "tasksPerPage=101", "page=abc"] {
        let req = authed(
            test::TestRequest::get().uri(&format!("/api/tasks/all?{}", query)),
            &alice,
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "query {}", query);
    }
}

#[actix_rt::test]
async fn test_delete_task_removes_blobs_and_records() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "cleaner@example.com").await;

    let task = create_task(&app, &token, "Doomed", &["1.png", "2.png", "3.png"]).await;
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let req = authed(test::TestRequest::delete().uri(&uri), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "deleted": true }));

    assert_eq!(ctx.blobs.delete_calls(), 3);
    assert!(ctx.blobs.is_empty());
    assert_eq!(ctx.repo.attachment_count(), 0);
    assert_eq!(ctx.repo.task_count(), 0);

    let req = authed(test::TestRequest::get().uri(&uri), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_delete_attachment_is_scoped_to_task() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "scoped@example.com").await;

    let first = create_task(&app, &token, "First", &["one.png"]).await;
    let second = create_task(&app, &token, "Second", &[]).await;
    let file_id = file_ids(&first).remove(0);

    let wrong_uri = format!(
        "/api/tasks/{}/attachments/{}",
        second["id"].as_str().unwrap(),
        file_id
    );
    let req = authed(test::TestRequest::delete().uri(&wrong_uri), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(ctx.blobs.len(), 1);

    let uri = format!(
        "/api/tasks/{}/attachments/{}",
        first["id"].as_str().unwrap(),
        file_id
    );
    let req = authed(test::TestRequest::delete().uri(&uri), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(ctx.blobs.is_empty());
    assert_eq!(ctx.repo.attachment_count(), 0);
}

#[actix_rt::test]
async fn test_failed_blob_delete_keeps_task() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let token = register(&app, "stubborn@example.com").await;

    let task = create_task(&app, &token, "Stubborn", &["x.png"]).await;
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
    ctx.blobs.fail_deletes(true);

    let req = authed(test::TestRequest::delete().uri(&uri), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Internal server error" }));
    assert_eq!(ctx.repo.task_count(), 1);
    assert_eq!(ctx.repo.attachment_count(), 1);
}
