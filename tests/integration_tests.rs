use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use resumrr::forwarder::MAX_FEED_BYTES;
use resumrr::{config::Config, create_app, AppState, SubmissionSigner};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{header as header_is, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGIN: &str = "https://app.example";
const SECRET: &str = "webhook-secret";
const BOUNDARY: &str = "resumrr-test-boundary";
const PDF: &str = "application/pdf";
/// Nothing listens here, so connections are refused immediately
const CLOSED_PORT_URL: &str = "http://127.0.0.1:1";

fn test_config(upstream: &MockServer) -> Config {
    Config {
        public_origin: Some(ORIGIN.to_string()),
        read_url: Some(format!("{}/candidates", upstream.uri())),
        read_auth: Some("Bearer read-token".to_string()),
        webhook_url: Some(format!("{}/webhook", upstream.uri())),
        webhook_secret: Some(SECRET.to_string()),
        recruiter_key: Some("letmein".to_string()),
        ..Config::default()
    }
}

fn app(config: Config) -> Router {
    create_app(Arc::new(AppState::new(config).unwrap()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

struct Resume<'a> {
    file_name: &'a str,
    content_type: &'a str,
    bytes: Vec<u8>,
}

fn multipart_body(fields: &[(&str, &str)], resume: Option<Resume<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(resume) = resume {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, resume.file_name, resume.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&resume.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn pdf_resume() -> Resume<'static> {
    Resume {
        file_name: "Ada CV.pdf",
        content_type: PDF,
        bytes: vec![b'%'; 1024],
    }
}

fn valid_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name", "Ada Lovelace"),
        ("email", "ada@example.com"),
        ("jobTitle", "Engineer"),
        ("company", ""),
    ]
}

fn submit_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/submit")
        .header(header::ORIGIN, ORIGIN)
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .header(header::USER_AGENT, "integration-test")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn data_request() -> Request<Body> {
    Request::builder()
        .uri("/api/recruiter/data")
        .header(header::REFERER, format!("{}/r/letmein", ORIGIN))
        .header("x-forwarded-for", "198.51.100.20")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint_has_security_headers() {
    let upstream = MockServer::start().await;
    let response = app(test_config(&upstream))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert_eq!(headers["x-content-type-options"], "nosniff");

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_recruiter_data_normalizes_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/candidates"))
        .and(header_is("authorization", "Bearer read-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Ada", "highlights": "rust, math", "atsScore": 140 },
            { "name": "Grace", "skills": ["cobol"], "yearsExperience": -2, "createdAt": "2024-01-01T00:00:00.000Z" }
        ])))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream)).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-store");

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert!(body["updatedAt"].is_string());
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], "1");
    assert_eq!(data[0]["skills"], json!(["rust", "math"]));
    assert_eq!(data[0]["atsScore"], 100.0);
    assert_eq!(data[1]["yearsExperience"], 0.0);
    assert_eq!(data[1]["createdAt"], "2024-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn test_recruiter_data_rejects_foreign_origin_before_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&upstream)
        .await;

    let request = Request::builder()
        .uri("/api/recruiter/data")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();

    let response = app(test_config(&upstream)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_recruiter_data_rate_limited() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&upstream)
        .await;

    let config = Config {
        rate_limit_capacity: 2,
        ..test_config(&upstream)
    };
    let app = app(config);

    for _ in 0..2 {
        let response = app.clone().oneshot(data_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["message"], "Too many requests");
}

#[tokio::test]
async fn test_recruiter_data_not_configured() {
    let upstream = MockServer::start().await;
    let config = Config {
        read_url: None,
        ..test_config(&upstream)
    };

    let response = app(config).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "Server not configured" })
    );
}

#[tokio::test]
async fn test_recruiter_data_upstream_error_is_echoed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(800)))
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream)).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["status"], 503);
    assert_eq!(body["body"].as_str().unwrap().len(), 500);
}

#[tokio::test]
async fn test_recruiter_data_invalid_json() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream)).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["message"], "Invalid upstream JSON");
}

#[tokio::test]
async fn test_recruiter_data_unreachable_upstream() {
    let upstream = MockServer::start().await;
    let config = Config {
        read_url: Some(format!("{}/candidates", CLOSED_PORT_URL)),
        ..test_config(&upstream)
    };

    let response = app(config).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await, json!({ "message": "Upstream error" }));
}

#[tokio::test]
async fn test_recruiter_data_oversized_feed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1".repeat(MAX_FEED_BYTES + 1)))
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream)).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["message"], "Upstream response too large");
}

#[tokio::test]
async fn test_recruiter_data_large_error_body_is_cut_on_char_boundary() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("é".repeat(100_000)))
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream)).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["status"], 500);
    assert_eq!(body["body"].as_str().unwrap(), "é".repeat(500));
}

#[tokio::test]
async fn test_recruiter_data_non_array_is_empty() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream)).oneshot(data_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[tokio::test]
async fn test_submit_forwards_signed_submission() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(header_exists("x-payload"))
        .and(header_exists("x-signature"))
        .and(header_exists("x-timestamp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let body = multipart_body(&valid_fields(), Some(pdf_resume()));
    let response = app(test_config(&upstream))
        .oneshot(submit_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true }));

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let forwarded = &received[0];

    let payload = forwarded.headers.get("x-payload").unwrap().to_str().unwrap();
    let signature = forwarded.headers.get("x-signature").unwrap().to_str().unwrap();
    let timestamp = forwarded.headers.get("x-timestamp").unwrap().to_str().unwrap();

    let expected = format!(
        r#"{{"name":"Ada Lovelace","email":"ada@example.com","jobTitle":"Engineer","timestamp":"{}","ip":"203.0.113.7"}}"#,
        timestamp
    );
    assert_eq!(payload, expected);
    assert!(SubmissionSigner::new(SECRET).verify(payload.as_bytes(), signature));

    let forwarded_body = String::from_utf8_lossy(&forwarded.body);
    assert!(forwarded_body.contains(&format!("filename=\"{}_Ada_CV.pdf\"", timestamp)));
    assert!(forwarded_body.contains("integration-test"));
}

#[tokio::test]
async fn test_submit_honeypot_never_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let mut fields = valid_fields();
    fields.retain(|(name, _)| *name != "company");
    fields.push(("company", "acme"));

    let response = app(test_config(&upstream))
        .oneshot(submit_request(multipart_body(&fields, Some(pdf_resume()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Bad request");
}

#[tokio::test]
async fn test_submit_rejects_foreign_origin() {
    let upstream = MockServer::start().await;
    let mut request = submit_request(multipart_body(&valid_fields(), Some(pdf_resume())));
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());

    let response = app(test_config(&upstream)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submit_missing_fields_and_bad_email() {
    let upstream = MockServer::start().await;
    let app = app(test_config(&upstream));

    let response = app
        .clone()
        .oneshot(submit_request(multipart_body(&valid_fields(), None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Missing required fields");

    let fields = [("name", "Ada"), ("email", "ada-at-example"), ("jobTitle", "Engineer")];
    let response = app
        .clone()
        .oneshot(submit_request(multipart_body(&fields, Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Invalid email");
}

#[tokio::test]
async fn test_submit_unsupported_type() {
    let upstream = MockServer::start().await;
    let resume = Resume {
        file_name: "photo.png",
        content_type: "image/png",
        bytes: vec![0; 16],
    };

    let response = app(test_config(&upstream))
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(resume))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Unsupported file type");
}

#[tokio::test]
async fn test_submit_oversized_file() {
    let upstream = MockServer::start().await;
    let resume = Resume {
        file_name: "huge.pdf",
        content_type: PDF,
        bytes: vec![0; 10 * 1024 * 1024 + 1],
    };

    let response = app(test_config(&upstream))
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(resume))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_submit_not_configured() {
    let upstream = MockServer::start().await;
    let config = Config {
        webhook_secret: None,
        ..test_config(&upstream)
    };

    let response = app(config)
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_submit_upstream_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream))
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["message"], "n8n error: workflow crashed");
}

#[tokio::test]
async fn test_submit_with_turnstile() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let config = Config {
        turnstile_secret: Some("ts-secret".to_string()),
        turnstile_verify_url: format!("{}/siteverify", upstream.uri()),
        ..test_config(&upstream)
    };
    let app = app(config);

    // token missing: rejected without calling the verifier
    let response = app
        .clone()
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Turnstile token missing");

    let mut fields = valid_fields();
    fields.push(("turnstileToken", "token-123"));
    let response = app
        .clone()
        .oneshot(submit_request(multipart_body(&fields, Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_dashboard_key_gate() {
    let upstream = MockServer::start().await;
    let app = app(test_config(&upstream));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/r/letmein").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-robots-tag"], "noindex, nofollow");
    assert!(body_text(response).await.contains("Recruiter Dashboard"));

    let wrong = app
        .clone()
        .oneshot(Request::builder().uri("/r/guess").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let unknown = app
        .clone()
        .oneshot(Request::builder().uri("/no/such/page").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(wrong.status(), StatusCode::NOT_FOUND);
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(wrong).await, body_text(unknown).await);
}

#[tokio::test]
async fn test_dashboard_disabled_without_key() {
    let upstream = MockServer::start().await;
    let config = Config {
        recruiter_key: None,
        ..test_config(&upstream)
    };

    let response = app(config)
        .oneshot(Request::builder().uri("/r/anything").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_landing_page_renders_site_key() {
    let upstream = MockServer::start().await;
    let config = Config {
        turnstile_site_key: Some("0x4AAA-site_key".to_string()),
        ..test_config(&upstream)
    };

    let response = app(config)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"data-sitekey="0x4AAA-site_key""#));
    assert!(!html.contains("{{TURNSTILE_WIDGET}}"));
}

#[tokio::test]
async fn test_submit_unreachable_webhook() {
    let upstream = MockServer::start().await;
    let config = Config {
        webhook_url: Some(format!("{}/webhook", CLOSED_PORT_URL)),
        ..test_config(&upstream)
    };

    let response = app(config)
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await, json!({ "message": "Failed to reach n8n" }));
}

#[tokio::test]
async fn test_submit_empty_upstream_error_uses_status_reason() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = app(test_config(&upstream))
        .oneshot(submit_request(multipart_body(&valid_fields(), Some(pdf_resume()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["message"], "n8n error: Service Unavailable");
}

#[tokio::test]
async fn test_submit_truncated_multipart_is_bad_request() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    // the field never reaches a closing boundary
    let body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAda",
        BOUNDARY
    );

    let response = app(test_config(&upstream))
        .oneshot(submit_request(body.into_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Invalid form submission");
}
