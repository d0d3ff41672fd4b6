use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use booksearch_core::records::save_collection;
use booksearch_core::{AnalyzerConfig, Book, IndexWriter, Settings};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn books() -> Vec<Book> {
    serde_json::from_value(serde_json::json!([
        {
            "isbn": "9787020002207",
            "title": "红楼梦",
            "author": "曹雪芹",
            "publisher": "人民文学出版社",
            "publicationDate": "1996-12-01",
            "salePrice": 35.0,
            "originalPrice": 59.7,
            "category": "文学艺术"
        },
        { "isbn": "9787020008728", "title": "三国演义", "author": "罗贯中", "salePrice": 42.5 },
        { "isbn": "9787020008735", "title": "水浒传", "contents": "第一回 洪太尉误走妖魔" },
        { "isbn": "<UNK>", "title": "红楼梦 残本" }
    ]))
    .unwrap()
}

fn app(dir: &Path) -> Router {
    let records = dir.join("books.json");
    let index = dir.join("index");
    let books = books();
    save_collection(&records, &books).unwrap();
    let mut writer = IndexWriter::open(&index, AnalyzerConfig::default()).unwrap();
    for b in &books {
        writer.add_book(b);
    }
    writer.close().unwrap();
    server::build_app(Settings { records_path: records, index_dir: index, ..Settings::default() }).unwrap()
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let (status, json) = call(app(dir.path()), "/search?q=%E7%BA%A2%E6%A5%BC%E6%A2%A6&k=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "红楼梦");
    assert!(json["took_s"].as_f64().unwrap() >= 0.0);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["rank"], 1);
    assert_eq!(arr[0]["isbn"], "9787020002207");
    assert_eq!(arr[0]["publicationDate"], "1996-12-01");
    assert_eq!(arr[0]["salePrice"], 35.0);
    assert!(arr[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn k_bounds_the_result_list() {
    let dir = tempdir().unwrap();
    let app = app(dir.path());
    let (_, json) = call(app.clone(), "/search?q=author:%E7%BD%97%E8%B4%AF%E4%B8%AD%20%E7%BA%A2%E6%A5%BC%E6%A2%A6&k=1").await;
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["total_hits"], 2);
    let (_, json) = call(app, "/search?q=zzzyx").await;
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn k_zero_returns_no_results() {
    let dir = tempdir().unwrap();
    let (status, json) = call(app(dir.path()), "/search?q=%E7%BA%A2%E6%A5%BC%E6%A2%A6&k=0").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_query_is_a_bad_request() {
    let dir = tempdir().unwrap();
    let (status, json) = call(app(dir.path()), "/search?q=%22%E7%BA%A2%E6%A5%BC").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("quote"));
}

#[tokio::test]
async fn book_lookup_by_isbn() {
    let dir = tempdir().unwrap();
    let app = app(dir.path());
    let (status, json) = call(app.clone(), "/book/9787020008735").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "水浒传");
    let (status, _) = call(app, "/book/0000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempdir().unwrap();
    let resp = app(dir.path())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[test]
fn missing_index_is_fatal() {
    let dir = tempdir().unwrap();
    let records = dir.path().join("books.json");
    save_collection(&records, &books()).unwrap();
    let settings = Settings { records_path: records, index_dir: dir.path().join("nope"), ..Settings::default() };
    assert!(server::build_app(settings).is_err());
}
