//! HTTP surface driven through `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use dish_scout::api::build_router;

async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn search_api(body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn scrape_returns_analytics_and_top_cards() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("lat", "19.07"))
        .and(query_param("lng", "72.87"))
        .and(query_param("str", "Biryani"))
        .respond_with(ResponseTemplate::new(200).set_body_json(primary_response(scenario_a_cards())))
        .expect(1)
        .mount(&server)
        .await;

    let router = build_router(test_state(StubCapture::new(server.uri())));
    let (status, body) = send(router, get("/scrape?item=Biryani&lat=19.07&long=72.87")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analytics"]["min"]["price"], 100.0);
    assert_eq!(body["analytics"]["min"]["name"], "Karim's");
    assert_eq!(body["analytics"]["min"]["deliveryTime"], "28");
    assert_eq!(body["analytics"]["max"]["price"], 300.0);
    assert_eq!(body["analytics"]["avgPrice"], 200.0);
    assert_eq!(body["analytics"]["priceVSrating"].as_array().unwrap().len(), 3);
    assert_eq!(body["analytics"]["priceVSdistance"][0]["distance"], 3.1);
    // Whole prices and counts come out as JSON integers, like the platform's own.
    assert!(body["analytics"]["min"]["price"].is_u64());
    assert!(body["analytics"]["avgPrice"].is_u64());

    let cards = body["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 3);
    assert_eq!(cards[0]["ratings"]["rating"], 4.5);
    assert_eq!(cards[0]["ratings"]["ratingCount"], 1100.0);
    assert!(cards[0]["ratings"]["ratingCount"].is_u64());
    assert!(cards[0]["ratings"]["rating"].is_f64());
    assert!(cards[0]["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://media-assets.swiggy.com/swiggy/image/upload/"));
    assert!(cards[0].get("dish").is_none());
}

#[tokio::test]
async fn root_path_uses_default_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("lat", "28.65420"))
        .and(query_param("lng", "77.23730"))
        .and(query_param("str", "Biryani"))
        .respond_with(ResponseTemplate::new(200).set_body_json(primary_response(scenario_a_cards())))
        .expect(1)
        .mount(&server)
        .await;

    let router = build_router(test_state(StubCapture::new(server.uri())));
    let (status, _) = send(router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn extended_fields_are_projected_into_cards() {
    let server = search_api(primary_response(scenario_a_cards())).await;
    let router = build_router(test_state(StubCapture::new(server.uri())));

    let (status, body) = send(router, get("/scrape?item=Biryani&fields=extended")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cards"][0]["dish"]["dishName"], "Hyderabadi Biryani");
}

#[tokio::test]
async fn no_match_maps_to_404() {
    let server = search_api(primary_response(scenario_a_cards())).await;
    let router = build_router(test_state(StubCapture::new(server.uri()).unmatched("Biryani")));

    let (status, body) = send(router, get("/scrape?item=Biryani")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["stage"], "NoMatch");
}

#[tokio::test]
async fn empty_result_is_200_with_empty_analytics() {
    let cards = vec![dish_card_with_counts("New Kitchen", 50, "0", "0", "0")];
    let server = search_api(primary_response(cards)).await;
    let router = build_router(test_state(StubCapture::new(server.uri())));

    let (status, body) = send(router, get("/scrape?item=Biryani")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "analytics": {}, "cards": [] }));
}

#[tokio::test]
async fn capture_failure_maps_to_500_with_stage() {
    let server = search_api(primary_response(scenario_a_cards())).await;
    let router = build_router(test_state(StubCapture::new(server.uri()).failing("Biryani")));

    let (status, body) = send(router, get("/scrape?item=Biryani")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["stage"], "CaptureError");
    assert!(body["error"].as_str().unwrap().contains("navigation"));
}

#[tokio::test]
async fn parse_failure_maps_to_500_with_stage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .mount(&server)
        .await;
    let router = build_router(test_state(StubCapture::new(server.uri())));

    let (status, body) = send(router, get("/scrape?item=Biryani")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["stage"], "ResponseParseError");
}

#[tokio::test]
async fn health() {
    let router = build_router(test_state(StubCapture::new("http://127.0.0.1:9")));
    let (status, body) = send(router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "dish-scout");
}

#[tokio::test]
async fn menu_analysis_nulls_failed_items_and_compares_the_rest() {
    let server = search_api(primary_response(scenario_a_cards())).await;
    let state = test_state(
        StubCapture::new(server.uri())
            .unmatched("Dragon Fruit Halwa")
            .failing("Broken Item"),
    );
    let router = build_router(state);

    let (status, body) = send(
        router,
        post_json(
            "/analyze/menu",
            json!({
                "location": { "lat": 19.07, "lng": "72.87", "name": "Bandra" },
                "items": [
                    { "name": "Biryani", "price": "2.50", "category": "Mains" },
                    { "name": "Dragon Fruit Halwa", "price": 180 },
                    { "name": "Broken Item", "price": 99 }
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analyzed"], 1);
    assert_eq!(body["failed"], 2);
    assert!(body["generatedAt"].is_string());

    let items = body["items"].as_array().unwrap();
    assert_eq!(items[0]["itemName"], "Biryani");
    assert_eq!(items[0]["analysis"]["avgPrice"], 200.0);
    let comparison = &items[0]["comparison"];
    assert_eq!(comparison["competitorAvgPrice"], 2.0);
    assert_eq!(comparison["priceDifference"], 0.5);
    assert_eq!(comparison["percentageDifference"], 25.0);
    assert_eq!(comparison["isMoreExpensive"], true);
    assert_eq!(comparison["isPriceMatch"], false);

    assert!(items[1]["analysis"].is_null());
    assert!(items[1].get("comparison").is_none());
    assert!(items[2]["analysis"].is_null());
    assert!(items[2]["failure"].as_str().unwrap().starts_with("CaptureError"));
}

#[tokio::test]
async fn menu_without_items_is_rejected() {
    let router = build_router(test_state(StubCapture::new("http://127.0.0.1:9")));
    let (status, _) = send(router, post_json("/analyze/menu", json!({ "items": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
