//! Signed client against an in-process S3 stub that checks every signature.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::put;
use flowship_config::{ObjectStoreConfig, ObjectTransport, Secret};
use flowship_credentials::InMemoryCredentialRegistry;
use flowship_events::PublishContext;
use flowship_object_store::{ObjectStoreError, ObjectStorePublisher};
use flowship_signer::RequestSigner;

const ACCESS_KEY: &str = "minio";
const SECRET_KEY: &str = "minio-secret";

#[derive(Clone, Default)]
struct Stub {
  buckets: Arc<Mutex<HashSet<String>>>,
  objects: Arc<Mutex<HashMap<String, Bytes>>>,
}

fn s3_error(status: StatusCode, code: &str) -> (StatusCode, String) {
  (
    status,
    format!(
      "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{}</Code><Message>{} from stub</Message></Error>",
      code, code
    ),
  )
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
}

fn authorized(method: &Method, path: &str, headers: &HeaderMap) -> bool {
  RequestSigner::new(ACCESS_KEY, SECRET_KEY)
    .verify(
      method.as_str(),
      path,
      header(headers, "content-type"),
      header(headers, "date"),
      header(headers, "authorization"),
    )
    .is_ok()
}

async fn create_bucket(
  State(stub): State<Stub>,
  Path(bucket): Path<String>,
  method: Method,
  headers: HeaderMap,
) -> (StatusCode, String) {
  if !authorized(&method, &format!("/{}", bucket), &headers) {
    return s3_error(StatusCode::FORBIDDEN, "SignatureDoesNotMatch");
  }
  if bucket == "forbidden" {
    return s3_error(StatusCode::FORBIDDEN, "AccessDenied");
  }
  if !stub.buckets.lock().unwrap().insert(bucket) {
    return s3_error(StatusCode::CONFLICT, "BucketAlreadyOwnedByYou");
  }
  (StatusCode::OK, String::new())
}

async fn object(
  State(stub): State<Stub>,
  Path((bucket, key)): Path<(String, String)>,
  method: Method,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Bytes, (StatusCode, String)> {
  let resource = format!("/{}/{}", bucket, key);
  if !authorized(&method, &resource, &headers) {
    return Err(s3_error(StatusCode::FORBIDDEN, "SignatureDoesNotMatch"));
  }
  if !stub.buckets.lock().unwrap().contains(&bucket) {
    return Err(s3_error(StatusCode::NOT_FOUND, "NoSuchBucket"));
  }

  let mut objects = stub.objects.lock().unwrap();
  if method == Method::PUT {
    objects.insert(resource, body);
    return Ok(Bytes::new());
  }
  objects
    .get(&resource)
    .cloned()
    .ok_or_else(|| s3_error(StatusCode::NOT_FOUND, "NoSuchKey"))
}

async fn start_stub() -> (String, Stub) {
  let stub = Stub::default();
  let app = Router::new()
    .route("/{bucket}", put(create_bucket))
    .route("/{bucket}/{*key}", put(object).get(object))
    .with_state(stub.clone());

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });
  (addr.to_string(), stub)
}

fn config(endpoint: &str) -> ObjectStoreConfig {
  ObjectStoreConfig {
    endpoint: endpoint.to_string(),
    access_key: ACCESS_KEY.to_string(),
    secret_key: Secret::new(SECRET_KEY),
    use_tls: false,
    bucket: "flows".to_string(),
    transport: ObjectTransport::Signed,
  }
}

fn publisher() -> ObjectStorePublisher {
  ObjectStorePublisher::new(Arc::new(InMemoryCredentialRegistry::new()))
}

#[tokio::test]
async fn test_ensure_bucket_twice_succeeds() {
  let (endpoint, stub) = start_stub().await;
  let publisher = publisher();
  let ctx = PublishContext::new();

  assert!(publisher.ensure_bucket(&config(&endpoint), "flows", &ctx).await.unwrap());
  assert!(!publisher.ensure_bucket(&config(&endpoint), "flows", &ctx).await.unwrap());
  assert_eq!(stub.buckets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_other_bucket_errors_are_fatal() {
  let (endpoint, _) = start_stub().await;
  let err = publisher()
    .ensure_bucket(&config(&endpoint), "forbidden", &PublishContext::new())
    .await
    .unwrap_err();

  match err {
    ObjectStoreError::Bucket { bucket, source } => {
      assert_eq!(bucket, "forbidden");
      assert_eq!(source.code(), Some("AccessDenied"));
    }
    other => panic!("expected bucket error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_signed_put_then_get_is_byte_identical() {
  let (endpoint, _) = start_stub().await;
  let publisher = publisher();
  let ctx = PublishContext::new();
  let blob: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

  let location = publisher
    .publish(Bytes::from(blob.clone()), "paris-weather", &config(&endpoint), &ctx)
    .await
    .unwrap();
  let fetched = publisher
    .retrieve(&config(&endpoint), &location.bucket, &location.key, &ctx)
    .await
    .unwrap();

  assert_eq!(fetched.as_ref(), blob.as_slice());
}

#[tokio::test]
async fn test_get_signature_rejected_for_put() {
  let (endpoint, stub) = start_stub().await;
  stub.buckets.lock().unwrap().insert("flows".to_string());

  let signed = RequestSigner::new(ACCESS_KEY, SECRET_KEY)
    .sign_request("GET", &endpoint, "/flows/weather.tar")
    .unwrap();

  let mut request =
    reqwest::Client::new().put(format!("http://{}/flows/weather.tar", endpoint));
  for (name, value) in signed.headers() {
    request = request.header(*name, value);
  }
  let response = request.body("payload").send().await.unwrap();

  assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
  assert!(response.text().await.unwrap().contains("SignatureDoesNotMatch"));
  assert!(stub.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
  let (endpoint, _) = start_stub().await;
  let mut config = config(&endpoint);
  config.secret_key = Secret::new("not-the-secret");

  let err = publisher()
    .ensure_bucket(&config, "flows", &PublishContext::new())
    .await
    .unwrap_err();
  let ObjectStoreError::Bucket { source, .. } = err else {
    panic!("expected bucket error");
  };
  assert_eq!(source.code(), Some("SignatureDoesNotMatch"));
}
