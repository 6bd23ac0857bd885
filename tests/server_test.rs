use axum::body::Body;
use axum::http::{Request, StatusCode};
use diamond_data::server::{app, HOME_MESSAGE, METHOD_NOT_ALLOWED_MESSAGE, NOT_FOUND_MESSAGE};
use tower::ServiceExt;

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_home_endpoint() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_text(response).await, HOME_MESSAGE);
}

#[tokio::test]
async fn test_unknown_route_is_reported_as_500() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, NOT_FOUND_MESSAGE);
}

#[tokio::test]
async fn test_post_to_home_is_reported_as_500() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, METHOD_NOT_ALLOWED_MESSAGE);
}

#[tokio::test]
async fn test_serve_binds_configured_port() {
    let mut settings = diamond_data::Settings::default();
    settings.server.host = "127.0.0.1".to_string();
    settings.server.port = 0;

    let handle = tokio::spawn(async move { diamond_data::server::serve(&settings).await });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!handle.is_finished());
    handle.abort();
}
