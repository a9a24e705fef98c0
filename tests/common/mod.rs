#![allow(dead_code)]

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use taskvault::auth::{AuthMiddleware, PasswordHasher, TokenService, ACCESS_TOKEN_HEADER};
use taskvault::blob::MemoryBlobStore;
use taskvault::routes::{self, health};
use taskvault::store::MemoryRepository;
use taskvault::AppState;

pub const PASSWORD: &str = "Password123";
pub const BOUNDARY: &str = "TASKVAULTBOUNDARY";

/// In-memory stores plus the shared state built on them.
pub struct TestContext {
    pub state: web::Data<AppState>,
    pub repo: Arc<MemoryRepository>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestContext {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let state = AppState::new(
            repo.clone(),
            blobs.clone(),
            TokenService::new("integration-secret", chrono::Duration::hours(1)),
            PasswordHasher::new(4),
        );
        Self {
            state: web::Data::new(state),
            repo,
            blobs,
        }
    }
}

/// Same layout as the binary: `/health` outside, everything else under the token check.
pub async fn init_app(
    ctx: &TestContext,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            ),
    )
    .await
}

/// Multipart body builder for upload tests.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn png(self, name: &str, file_name: &str) -> Self {
        self.file(name, file_name, "image/png", b"\x89PNG\r\n\x1a\n")
    }

    pub fn into_request(self, req: test::TestRequest) -> test::TestRequest {
        let mut body = self.body;
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        req.insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
    }
}

pub fn authed(req: test::TestRequest, token: &str) -> test::TestRequest {
    req.insert_header((ACCESS_TOKEN_HEADER, token))
}

/// Registers `email` with a JSON body and returns the issued token.
pub async fn register(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
) -> String {
    let req = test::TestRequest::post()
        .uri("/api/auth/registration")
        .set_json(json!({ "email": email, "name": "Tester", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    body["token"]
        .as_str()
        .expect("registration returns a token")
        .to_string()
}

/// Creates a task through the API, uploading `file_names` as PNG images.
pub async fn create_task(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    token: &str,
    title: &str,
    file_names: &[&str],
) -> Value {
    let mut body = MultipartBody::new().text("title", title);
    for name in file_names {
        body = body.png("files", name);
    }
    let req = body
        .into_request(authed(test::TestRequest::post().uri("/api/tasks"), token))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    test::read_body_json(resp).await
}
