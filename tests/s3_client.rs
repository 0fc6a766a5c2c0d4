//! `S3Client` against a wiremock S3 endpoint (path-style addressing).

use s3_ingest::config::StorageConfig;
use s3_ingest_core::store::ObjectStore;
use s3_ingest_core::Error;
use s3_ingest::s3::S3Client;
use sha2::{Digest, Sha256};
use wiremock::matchers::{body_string, body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>logs/data_x.json</Key></Error>"#;

fn storage(server: &MockServer, region: &str) -> StorageConfig {
    StorageConfig {
        region: region.to_string(),
        bucket: "ingest-logs".to_string(),
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: None,
        endpoint_url: Some(server.uri()),
    }
}

async fn client(server: &MockServer) -> S3Client {
    S3Client::new(&storage(server, "eu-west-1")).unwrap()
}

#[tokio::test]
async fn test_put_object_is_signed_with_payload_hash() {
    let server = MockServer::start().await;
    let body = br#"[{"id":1}]"#.to_vec();
    let hash = hex::encode(Sha256::digest(&body));

    Mock::given(method("PUT"))
        .and(path("/ingest-logs/logs/data_x.json"))
        .and(header("x-amz-content-sha256", hash.as_str()))
        .and(header("content-type", "application/json"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("authorization"))
        .and(body_string(r#"[{"id":1}]"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .await
        .put_object("logs/data_x.json", body, "application/json")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert!(auth.contains("/eu-west-1/s3/aws4_request"));
}

#[tokio::test]
async fn test_get_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ingest-logs/logs/data_x.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let bytes = client(&server).await.get_object("logs/data_x.json").await.unwrap();
    assert_eq!(bytes, b"[]");
}

#[tokio::test]
async fn test_get_missing_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(NO_SUCH_KEY))
        .mount(&server)
        .await;

    let err = client(&server).await.get_object("logs/data_x.json").await.unwrap_err();
    assert_eq!(
        err,
        Error::NotFound {
            key: "logs/data_x.json".to_string()
        }
    );
}

#[tokio::test]
async fn test_get_access_denied_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
        ))
        .mount(&server)
        .await;

    let err = client(&server).await.get_object("logs/data_x.json").await.unwrap_err();
    match err {
        Error::Transport(msg) => {
            assert!(msg.contains("403"));
            assert!(msg.contains("AccessDenied"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_bucket_on_get_is_not_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            "<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist</Message></Error>",
        ))
        .mount(&server)
        .await;

    let err = client(&server).await.get_object("logs/data_x.json").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

fn list_page(keys: &[&str], next: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|k| format!("<Contents><Key>{}</Key><Size>2</Size></Contents>", k))
        .collect();
    let (truncated, token) = match next {
        Some(t) => ("true", format!("<NextContinuationToken>{}</NextContinuationToken>", t)),
        None => ("false", String::new()),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>ingest-logs</Name><Prefix>logs/</Prefix><IsTruncated>{}</IsTruncated>{}{}</ListBucketResult>"#,
        truncated, token, contents
    )
}

#[tokio::test]
async fn test_list_follows_continuation_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ingest-logs"))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "logs/"))
        .and(query_param("continuation-token", "page/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&["logs/c.json"], None)))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ingest-logs"))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(
            &["logs/a.json", "logs/b.json"],
            Some("page/2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let keys = client(&server).await.list_keys("logs/").await.unwrap();
    assert_eq!(keys, vec!["logs/a.json", "logs/b.json", "logs/c.json"]);
}

#[tokio::test]
async fn test_list_empty_bucket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ingest-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&[], None)))
        .mount(&server)
        .await;

    assert!(client(&server).await.list_keys("logs/").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_object() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/ingest-logs/logs/data_x.json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).await.delete_object("logs/data_x.json").await.unwrap();
}

#[tokio::test]
async fn test_bucket_exists() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/ingest-logs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    assert!(client(&server).await.bucket_exists().await.unwrap());
}

#[tokio::test]
async fn test_bucket_missing() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    assert!(!client(&server).await.bucket_exists().await.unwrap());
}

#[tokio::test]
async fn test_bucket_forbidden_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    assert!(client(&server).await.bucket_exists().await.is_err());
}

#[tokio::test]
async fn test_create_bucket_sends_location_constraint() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/ingest-logs"))
        .and(body_string_contains("<LocationConstraint>eu-west-1</LocationConstraint>"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).await.create_bucket().await.unwrap();
}

#[tokio::test]
async fn test_create_bucket_us_east_1_has_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/ingest-logs"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    S3Client::new(&storage(&server, "us-east-1"))
        .unwrap()
        .create_bucket()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_bucket_already_owned_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409).set_body_string(
            "<Error><Code>BucketAlreadyOwnedByYou</Code><Message>owned</Message></Error>",
        ))
        .mount(&server)
        .await;

    client(&server).await.create_bucket().await.unwrap();
}

#[tokio::test]
async fn test_create_bucket_taken_by_someone_else_fails() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409).set_body_string(
            "<Error><Code>BucketAlreadyExists</Code><Message>taken</Message></Error>",
        ))
        .mount(&server)
        .await;

    let err = client(&server).await.create_bucket().await.unwrap_err();
    assert!(err.to_string().contains("BucketAlreadyExists"));
}
