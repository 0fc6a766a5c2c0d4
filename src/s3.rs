//! Amazon S3 object store client.
//!
//! Implements [`ObjectStore`] over the S3 REST API with AWS Signature V4
//! authentication. Supports custom endpoints for S3-compatible services
//! (MinIO, LocalStack); a custom endpoint switches to path-style addressing
//! (`<endpoint>/<bucket>/<key>`), otherwise requests go to
//! `https://<bucket>.s3.<region>.amazonaws.com/<key>`.
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`) for signing and
//! `quick-xml` for the XML listing and error bodies.
//!
//! # Error mapping
//!
//! | S3 response | Result |
//! |-------------|--------|
//! | `404` with code `NoSuchKey`, or `404` without a body | [`Error::NotFound`] |
//! | `409 BucketAlreadyOwnedByYou` on create | success |
//! | anything else non-2xx | [`Error::Transport`] with status and code |
//! | network failure | [`Error::Transport`] |
//!
//! # Pagination
//!
//! Listings follow `ListObjectsV2` continuation tokens until the whole
//! prefix has been read.

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Method, StatusCode, Url};
use sha2::{Digest, Sha256};
use tracing::debug;

use s3_ingest_core::store::ObjectStore;
use s3_ingest_core::{Error, Result};

use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Signed S3 client bound to one bucket.
pub struct S3Client {
    client: reqwest::Client,
    bucket: String,
    region: String,
    endpoint: Endpoint,
    creds: AwsCredentials,
}

/// Where requests are sent and how the bucket is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    /// `scheme://host[:port]`, no trailing slash.
    base_url: String,
    /// Value of the signed `host` header.
    host: String,
    /// Put the bucket in the path instead of the hostname.
    path_style: bool,
}

/// AWS credentials used for signing.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl S3Client {
    /// Build a client from validated storage settings.
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let endpoint = resolve_endpoint(config)?;
        debug!(
            bucket = %config.bucket,
            region = %config.region,
            base_url = %endpoint.base_url,
            path_style = endpoint.path_style,
            "S3 client initialized"
        );
        Ok(Self {
            client: reqwest::Client::new(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint,
            creds: AwsCredentials {
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
                session_token: config.session_token.clone(),
            },
        })
    }

    /// Canonical URI of the bucket itself.
    fn bucket_path(&self) -> String {
        if self.endpoint.path_style {
            format!("/{}", uri_encode(&self.bucket))
        } else {
            "/".to_string()
        }
    }

    /// Canonical URI of an object, each path segment encoded.
    fn object_path(&self, key: &str) -> String {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        if self.endpoint.path_style {
            format!("/{}/{}", uri_encode(&self.bucket), encoded_key)
        } else {
            format!("/{}", encoded_key)
        }
    }

    /// Sign and send one request.
    ///
    /// `query` must not be URI-encoded yet. Network failures become
    /// [`Error::Transport`]; status codes are left to the caller.
    async fn send(
        &self,
        method: Method,
        canonical_uri: &str,
        query: &[(String, String)],
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response> {
        let canonical_querystring = canonical_query(query);
        let payload_hash = hex_sha256(&body);

        let signed = sign_request(
            &SigningInput {
                method: method.as_str(),
                host: &self.endpoint.host,
                canonical_uri,
                canonical_querystring: &canonical_querystring,
                payload_hash: &payload_hash,
                session_token: self.creds.session_token.as_deref(),
                region: &self.region,
            },
            &self.creds.access_key_id,
            &self.creds.secret_access_key,
            Utc::now(),
        );

        let mut url = format!("{}{}", self.endpoint.base_url, canonical_uri);
        if !canonical_querystring.is_empty() {
            url.push('?');
            url.push_str(&canonical_querystring);
        }

        let mut req_builder = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &signed.amz_date);

        if let Some(ref token) = self.creds.session_token {
            req_builder = req_builder.header("x-amz-security-token", token);
        }
        if let Some(ct) = content_type {
            req_builder = req_builder.header("Content-Type", ct);
        }
        if !body.is_empty() {
            req_builder = req_builder.body(body);
        }

        debug!(method = %method, url = %url, "S3 request");
        req_builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} {} failed: {}", method, url, e)))
    }

    /// Turn a non-success response into the matching [`Error`].
    async fn error_from_response(
        &self,
        operation: &str,
        key: &str,
        resp: reqwest::Response,
    ) -> Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let parsed = parse_error_body(&body);

        let not_found = match parsed.code.as_deref() {
            Some("NoSuchKey") => true,
            None => status == StatusCode::NOT_FOUND,
            Some(_) => false,
        };
        if not_found {
            return Error::NotFound {
                key: key.to_string(),
            };
        }

        Error::Transport(format!(
            "S3 {} failed for s3://{}/{} (HTTP {}){}{}",
            operation,
            self.bucket,
            key,
            status,
            parsed.code.map(|c| format!(" {}", c)).unwrap_or_default(),
            parsed.message.map(|m| format!(": {}", m)).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let resp = self
            .send(Method::PUT, &self.object_path(key), &[], body, Some(content_type))
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response("PutObject", key, resp).await);
        }
        debug!(bucket = %self.bucket, key, "stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .send(Method::GET, &self.object_path(key), &[], Vec::new(), None)
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response("GetObject", key, resp).await);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read s3://{}/{}: {}", self.bucket, key, e)))?;
        Ok(bytes.to_vec())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut query_params = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), "1000".to_string()),
            ];
            if !prefix.is_empty() {
                query_params.push(("prefix".to_string(), prefix.to_string()));
            }
            if let Some(ref token) = continuation_token {
                query_params.push(("continuation-token".to_string(), token.clone()));
            }

            let resp = self
                .send(Method::GET, &self.bucket_path(), &query_params, Vec::new(), None)
                .await?;
            if !resp.status().is_success() {
                return Err(self.error_from_response("ListObjectsV2", prefix, resp).await);
            }

            let xml_body = resp
                .text()
                .await
                .map_err(|e| Error::Transport(format!("failed to read listing: {}", e)))?;
            let page = parse_list_objects_response(&xml_body)?;
            keys.extend(page.keys);

            match page.next_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let resp = self
            .send(Method::DELETE, &self.object_path(key), &[], Vec::new(), None)
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response("DeleteObject", key, resp).await);
        }
        debug!(bucket = %self.bucket, key, "deleted object");
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        let resp = self
            .send(Method::HEAD, &self.bucket_path(), &[], Vec::new(), None)
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(self.error_from_response("HeadBucket", "", resp).await),
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let body = create_bucket_body(&self.region);
        let content_type = (!body.is_empty()).then_some("application/xml");
        let resp = self
            .send(Method::PUT, &self.bucket_path(), &[], body, content_type)
            .await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let parsed = parse_error_body(&text);
        if parsed.code.as_deref() == Some("BucketAlreadyOwnedByYou") {
            return Ok(());
        }
        Err(Error::Transport(format!(
            "S3 CreateBucket failed for {} (HTTP {}){}{}",
            self.bucket,
            status,
            parsed.code.map(|c| format!(" {}", c)).unwrap_or_default(),
            parsed.message.map(|m| format!(": {}", m)).unwrap_or_default(),
        )))
    }
}

// ============ Endpoint resolution ============

fn resolve_endpoint(config: &StorageConfig) -> anyhow::Result<Endpoint> {
    match config.endpoint_url.as_deref() {
        Some(raw) => {
            let url = Url::parse(raw)
                .with_context(|| format!("Invalid S3 endpoint URL: {}", raw))?;
            let host = match url.host_str() {
                Some(h) => h.to_string(),
                None => bail!("S3 endpoint URL has no host: {}", raw),
            };
            let host = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host,
            };
            Ok(Endpoint {
                base_url: format!("{}://{}", url.scheme(), host),
                host,
                path_style: true,
            })
        }
        None => {
            let host = format!("{}.s3.{}.amazonaws.com", config.bucket, config.region);
            Ok(Endpoint {
                base_url: format!("https://{}", host),
                host,
                path_style: false,
            })
        }
    }
}

/// `CreateBucket` request body. `us-east-1` must not send a location constraint.
fn create_bucket_body(region: &str) -> Vec<u8> {
    if region == "us-east-1" {
        return Vec::new();
    }
    format!(
        "<CreateBucketConfiguration xmlns=\"{}\"><LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
        S3_NAMESPACE, region
    )
    .into_bytes()
}

// ============ AWS SigV4 ============

/// Request parts that go into the canonical request.
struct SigningInput<'a> {
    method: &'a str,
    host: &'a str,
    canonical_uri: &'a str,
    canonical_querystring: &'a str,
    payload_hash: &'a str,
    session_token: Option<&'a str>,
    region: &'a str,
}

/// Headers produced by signing.
#[derive(Debug)]
struct SignedRequest {
    authorization: String,
    amz_date: String,
}

/// Sign a request for the `s3` service with AWS Signature V4.
fn sign_request(
    input: &SigningInput<'_>,
    access_key_id: &str,
    secret_access_key: &str,
    now: DateTime<Utc>,
) -> SignedRequest {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut headers = vec![
        ("host".to_string(), input.host.to_string()),
        ("x-amz-content-sha256".to_string(), input.payload_hash.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(token) = input.session_token {
        headers.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        input.method,
        input.canonical_uri,
        input.canonical_querystring,
        canonical_headers,
        signed_headers,
        input.payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, input.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(secret_access_key, &date_stamp, input.region, "s3");
    let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

    SignedRequest {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            access_key_id, credential_scope, signed_headers, signature
        ),
        amz_date,
    }
}

/// Sorted, encoded query string for the canonical request and the URL.
fn canonical_query(params: &[(String, String)]) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986, leaving only `A-Z a-z 0-9 - _ . ~`.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

// ============ XML ============

/// One page of a `ListObjectsV2` response.
#[derive(Debug, Default)]
struct ListPage {
    keys: Vec<String>,
    is_truncated: bool,
    next_token: Option<String>,
}

fn parse_list_objects_response(xml: &str) -> Result<ListPage> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListPage::default();
    let mut current: Option<Vec<u8>> = None;
    let mut in_contents = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"Contents" {
                    in_contents = true;
                }
                current = Some(name);
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Contents" {
                    in_contents = false;
                }
                current = None;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Decode(format!("bad ListObjectsV2 XML: {}", e)))?
                    .into_owned();
                match current.as_deref() {
                    Some(b"Key") if in_contents => page.keys.push(text),
                    Some(b"IsTruncated") => page.is_truncated = text == "true",
                    Some(b"NextContinuationToken") => page.next_token = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Decode(format!("bad ListObjectsV2 XML: {}", e))),
            _ => {}
        }
    }

    Ok(page)
}

/// `<Error><Code>..</Code><Message>..</Message></Error>` body.
#[derive(Debug, Default, PartialEq)]
struct S3ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Best-effort parse of an S3 error body. Malformed or empty bodies yield
/// an empty result.
fn parse_error_body(xml: &str) -> S3ErrorBody {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = S3ErrorBody::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => current = Some(e.local_name().as_ref().to_vec()),
            Ok(Event::End(_)) => current = None,
            Ok(Event::Text(t)) => {
                let Ok(text) = t.unescape() else { break };
                match current.as_deref() {
                    Some(b"Code") => parsed.code = Some(text.into_owned()),
                    Some(b"Message") => parsed.message = Some(text.into_owned()),
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    parsed
}
