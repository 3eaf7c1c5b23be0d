use crate::batch::Batch;
use crate::queue::{BatchSink, SendError};
use crate::record::Record;
use crate::source::{ReadError, RecordSource};
use async_trait::async_trait;
use aws_sdk_sqs::config::Credentials;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use testcontainers::ContainerAsync;
use testcontainers_modules::{
    localstack::LocalStack,
    testcontainers::{runners::AsyncRunner, Image, ImageExt, TestcontainersError},
};
use tokio::sync::Semaphore;

pub fn local_config(endpoint_url: &str, region: Option<&'static str>) -> aws_config::ConfigLoader {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .endpoint_url(endpoint_url)
        .region(region.unwrap_or("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
}

pub async fn localstack() -> Result<(String, ContainerAsync<LocalStack>), TestcontainersError> {
    let request = LocalStack::default()
        .with_tag("latest")
        .with_env_var("SERVICES", "sqs")
        .with_env_var("SKIP_SSL_CERT_DOWNLOAD", "1");
    let container = request.start().await?;

    let host_ip = container.get_host().await?;
    let host_port = container.get_host_port_ipv4(4566).await?;
    let endpoint_url = format!("http://{host_ip}:{host_port}");

    Ok((endpoint_url, container))
}

/// Creates a queue inside the container and returns its URL.
pub async fn create_test_queue<I: Image>(
    container: &ContainerAsync<I>,
    name: &str,
) -> Result<String, TestcontainersError> {
    let create_queue_command = testcontainers::core::ExecCommand::new([
        "awslocal",
        "sqs",
        "create-queue",
        "--queue-name",
        name,
    ])
    .with_container_ready_conditions(vec![testcontainers::core::WaitFor::message_on_stdout(
        "AWS sqs.CreateQueue => 200",
    )]);

    let mut result = container.exec(create_queue_command).await?;
    let output = result.stdout_to_vec().await?;

    let json: serde_json::Value =
        serde_json::from_slice(&output).map_err(|e| TestcontainersError::Other(Box::new(e)))?;

    match json["QueueUrl"].as_str() {
        Some(url) => Ok(url.to_string()),
        None => Err(TestcontainersError::Other(
            "QueueUrl not found in response".into(),
        )),
    }
}

/// Generate a unique queue name for testing, using a UUID suffix.
pub fn unique_queue_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Isolated in-memory SQLite database reached through the `Any` driver.
///
/// A single connection that never expires, otherwise each new connection would
/// see its own empty database.
pub async fn memory_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

/// Creates the `packages` table and inserts one row per id, in the given order.
pub async fn seed_packages(pool: &AnyPool, ids: &[&str]) {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS packages (
            package_id TEXT NOT NULL,
            package_host TEXT,
            package_owner TEXT,
            package_repo TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .unwrap();

    for id in ids {
        sqlx::query(
            "INSERT INTO packages (package_id, package_host, package_owner, package_repo) VALUES ($1, $2, $3, $4)",
        )
        .bind(id.to_string())
        .bind("github.com")
        .bind(format!("owner-{id}"))
        .bind(format!("repo-{id}"))
        .execute(pool)
        .await
        .unwrap();
    }
}

/// `n` small records with zero-padded, ascending ids.
pub fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let id = format!("{i:03}");
            Record::new(id.clone(), "github.com", format!("owner-{id}"), format!("repo-{id}"))
        })
        .collect()
}

pub struct VecSource(Vec<Record>);

impl VecSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self(records)
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn fetch_all(&self) -> Result<Vec<Record>, ReadError> {
        Ok(self.0.clone())
    }
}

pub struct FailingSource;

#[async_trait]
impl RecordSource for FailingSource {
    async fn fetch_all(&self) -> Result<Vec<Record>, ReadError> {
        Err(ReadError::Query(sqlx::Error::PoolTimedOut))
    }
}

/// Keeps every batch it receives as `(id, body)` pairs.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<(String, String)>>>,
}

impl RecordingSink {
    /// Message bodies per batch, in send order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.iter().map(|(_, body)| body.clone()).collect())
            .collect()
    }

    /// Every entry id sent, flattened in send order.
    pub fn ids(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn send_batch(&self, batch: &Batch) -> Result<(), SendError> {
        let entries = batch
            .entries()
            .iter()
            .map(|e| (e.id.to_string(), e.body.clone()))
            .collect();
        self.batches.lock().unwrap().push(entries);
        Ok(())
    }
}

/// Accepts the first `succeed` batches, then fails every call.
pub struct FailingSink {
    succeed: usize,
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn after(succeed: usize) -> Self {
        Self {
            succeed,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSink for FailingSink {
    async fn send_batch(&self, _batch: &Batch) -> Result<(), SendError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.succeed {
            Ok(())
        } else {
            Err(SendError::Other("queue unavailable".to_string()))
        }
    }
}

/// Blocks every send until a permit is released through [`GatedSink::gate`].
pub struct GatedSink {
    gate: Arc<Semaphore>,
    entered: AtomicUsize,
    sent: AtomicUsize,
}

impl GatedSink {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            entered: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
        }
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone()
    }

    /// Sends currently blocked at the gate.
    pub fn waiting(&self) -> usize {
        self.entered.load(Ordering::SeqCst) - self.sent.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSink for GatedSink {
    async fn send_batch(&self, _batch: &Batch) -> Result<(), SendError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate
            .acquire()
            .await
            .map_err(|e| SendError::Other(e.to_string()))?
            .forget();
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Records log messages emitted on the thread that called [`capture_logs`].
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        CAPTURED.with(|captured| {
            if let Some(lines) = captured.borrow_mut().as_mut() {
                lines.push(record.args().to_string());
            }
        });
    }

    fn flush(&self) {}
}

/// Starts collecting log lines on the current thread until the guard is dropped.
///
/// Only the current-thread runtime of `#[tokio::test]` keeps every poll on this thread.
pub fn capture_logs() -> LogCapture {
    static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();

    let init_call = LOGGER.get().is_none();
    let logger = LOGGER.get_or_init(|| CaptureLogger);
    if init_call {
        let _ = log::set_logger(logger);
        log::set_max_level(log::LevelFilter::Trace);
    }

    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    LogCapture
}

pub struct LogCapture;

impl LogCapture {
    /// Captured lines containing `pattern`, in emission order.
    pub fn lines_containing(&self, pattern: &str) -> Vec<String> {
        CAPTURED.with(|captured| {
            captured
                .borrow()
                .iter()
                .flatten()
                .filter(|line| line.contains(pattern))
                .cloned()
                .collect()
        })
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        CAPTURED.with(|captured| *captured.borrow_mut() = None);
    }
}
