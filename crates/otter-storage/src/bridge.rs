//! The preferences bridge.
//!
//! Each op parses its options on the calling thread, queues the storage work
//! on the blocking pool and hands back a [`Promise`] straight away. Finished
//! work lands on a completion queue that the host drains from its own thread
//! with [`PreferenceBridge::poll_completions`]; that is where script callbacks
//! run and promises settle.
//!
//! ```text
//! queued -> executing (worker) -> completing (host thread) -> finalized
//! ```

use crate::code::ResultCode;
use crate::config::{AppContext, StaticContext, StorageConfig};
use crate::error::{StorageError, StorageResult};
use crate::request::{Operation, Request};
use crate::value::JsValue;
use crossbeam_channel::{Receiver, Sender, unbounded};
use otter_prefs::{Preferences, PreferencesHelper, PrefsError};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Longest accepted key, in bytes
pub const MAX_KEY_LENGTH: usize = 32;

/// Longest accepted value or default, in bytes
pub const MAX_VALUE_LENGTH: usize = 128;

type Settled = StorageResult<JsValue>;

/// Script-visible promise returned by every op.
///
/// Resolves with `undefined` once the request's callbacks have run, whether
/// the request succeeded or not. It only errors when the worker task itself
/// died, which the host raises as a `TypeError`.
#[derive(Debug)]
pub struct Promise {
    rx: oneshot::Receiver<Settled>,
}

impl Future for Promise {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(settled)) => Poll::Ready(settled),
            Poll::Ready(Err(_)) => Poll::Ready(Err(execute_failed())),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Deferred {
    tx: oneshot::Sender<Settled>,
}

impl Deferred {
    fn resolve(self, value: JsValue) {
        let _ = self.tx.send(Ok(value));
    }

    fn reject(self, err: StorageError) {
        let _ = self.tx.send(Err(err));
    }
}

fn deferred() -> (Deferred, Promise) {
    let (tx, rx) = oneshot::channel();
    (Deferred { tx }, Promise { rx })
}

fn execute_failed() -> StorageError {
    StorageError::type_error("Execute callback failed.")
}

struct Completion {
    op: Operation,
    deferred: Deferred,
    /// The request back from the worker, or why the worker task died
    outcome: Result<Request, String>,
}

struct CompletionQueue {
    tx: Sender<Completion>,
    inflight: AtomicU64,
}

impl CompletionQueue {
    fn push(&self, completion: Completion) {
        let _ = self.tx.send(completion);
    }
}

/// Counts one request as in flight until its task finishes or is dropped.
///
/// The completion is pushed before the guard drops, so a request is always
/// visible either here or on the completion channel.
struct InflightGuard {
    queue: Arc<CompletionQueue>,
}

impl InflightGuard {
    fn new(queue: Arc<CompletionQueue>) -> Self {
        queue.inflight.fetch_add(1, Ordering::AcqRel);
        Self { queue }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.queue.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs requests against the store; lives on the blocking pool.
struct Worker {
    context: Arc<dyn AppContext>,
    file_name: String,
}

impl Worker {
    fn store_path(&self) -> StorageResult<PathBuf> {
        Ok(self.context.preferences_dir()?.join(&self.file_name))
    }

    fn open_store(&self) -> Result<Arc<Preferences>, ResultCode> {
        let path = self.store_path().map_err(|e| {
            warn!(error = %e, "Failed to resolve preferences path");
            ResultCode::Error
        })?;
        PreferencesHelper::get_preferences(&path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to open preferences");
            ResultCode::Error
        })
    }

    fn execute(&self, request: &mut Request) {
        match self.run(request) {
            Ok(output) => {
                request.output = output;
                request.code = ResultCode::Ok;
            }
            Err(code) => request.code = code,
        }
    }

    fn run(&self, request: &Request) -> Result<String, ResultCode> {
        if request.code == ResultCode::KeyEmpty {
            return Err(ResultCode::KeyEmpty);
        }

        match request.op {
            Operation::Get => {
                check_len(&request.key, MAX_KEY_LENGTH, ResultCode::KeyExceedLengthLimit)?;
                check_len(
                    &request.default,
                    MAX_VALUE_LENGTH,
                    ResultCode::DefaultExceedLengthLimit,
                )?;
                let prefs = self.open_store()?;
                Ok(prefs.get_string(&request.key, &request.default))
            }
            Operation::Set => {
                check_len(&request.key, MAX_KEY_LENGTH, ResultCode::KeyExceedLengthLimit)?;
                check_len(
                    &request.value,
                    MAX_VALUE_LENGTH,
                    ResultCode::ValueExceedLengthLimit,
                )?;
                let prefs = self.open_store()?;
                prefs
                    .put_and_flush(&request.key, &request.value)
                    .map_err(engine_code)?;
                Ok(String::new())
            }
            Operation::Delete => {
                check_len(&request.key, MAX_KEY_LENGTH, ResultCode::KeyExceedLengthLimit)?;
                let prefs = self.open_store()?;
                prefs.delete_and_flush(&request.key).map_err(engine_code)?;
                Ok(String::new())
            }
            Operation::Clear => {
                let prefs = self.open_store()?;
                prefs.clear_and_flush().map_err(engine_code)?;
                Ok(String::new())
            }
        }
    }
}

fn check_len(s: &str, max: usize, code: ResultCode) -> Result<(), ResultCode> {
    if s.len() > max { Err(code) } else { Ok(()) }
}

fn engine_code(err: PrefsError) -> ResultCode {
    warn!(error = %err, code = err.code(), "Preferences engine error");
    ResultCode::from_code(err.code())
}

/// Run callbacks for a finished request and settle its promise.
fn complete(completion: Completion) {
    let Completion {
        op,
        deferred,
        outcome,
    } = completion;

    let request = match outcome {
        Ok(request) => request,
        Err(reason) => {
            error!(op = %op, reason = %reason, "Storage worker task failed");
            deferred.reject(execute_failed());
            return;
        }
    };

    let Request {
        code,
        output,
        callbacks,
        ..
    } = request;

    debug!(op = %op, code = code.code(), "Completing storage request");

    if code.is_ok() {
        if let Some(success) = &callbacks.success {
            success.call(&[JsValue::String(output)]);
        }
    } else if let Some(fail) = &callbacks.fail {
        fail.call(&[JsValue::from(code.message()), JsValue::from(code.code())]);
    }

    if let Some(complete) = &callbacks.complete {
        complete.call(&[]);
    }

    drop(callbacks);
    deferred.resolve(JsValue::Undefined);
}

/// `@system.storage` implementation
pub struct PreferenceBridge {
    worker: Arc<Worker>,
    queue: Arc<CompletionQueue>,
    completions: Receiver<Completion>,
    runtime: Option<Handle>,
}

impl PreferenceBridge {
    /// Bridge whose store lives in `config.preferences_dir`
    pub fn new(config: StorageConfig) -> Self {
        let context = Arc::new(StaticContext::new(config.preferences_dir.clone()));
        Self::with_context(config, context)
    }

    /// Bridge resolving the preferences directory through `context`
    pub fn with_context(config: StorageConfig, context: Arc<dyn AppContext>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            worker: Arc::new(Worker {
                context,
                file_name: config.file_name,
            }),
            queue: Arc::new(CompletionQueue {
                tx,
                inflight: AtomicU64::new(0),
            }),
            completions: rx,
            runtime: config.runtime,
        }
    }

    /// `get({key, default?, success?, fail?, complete?})`
    pub fn get(&self, args: &[JsValue]) -> StorageResult<Promise> {
        self.operate(Operation::Get, args)
    }

    /// `set({key, value, success?, fail?, complete?})`
    pub fn set(&self, args: &[JsValue]) -> StorageResult<Promise> {
        self.operate(Operation::Set, args)
    }

    /// `delete({key, success?, fail?, complete?})`
    pub fn delete(&self, args: &[JsValue]) -> StorageResult<Promise> {
        self.operate(Operation::Delete, args)
    }

    /// `clear({success?, fail?, complete?})`
    pub fn clear(&self, args: &[JsValue]) -> StorageResult<Promise> {
        self.operate(Operation::Clear, args)
    }

    /// Parse `args`, queue the work and return its promise without blocking.
    pub fn operate(&self, op: Operation, args: &[JsValue]) -> StorageResult<Promise> {
        let request = Request::parse(op, args)?;

        let handle = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(StorageError::NoRuntime)?;

        let (deferred, promise) = deferred();
        let worker = self.worker.clone();
        let guard = InflightGuard::new(self.queue.clone());

        debug!(op = %op, key = request.key(), "Queued storage request");

        handle.spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || {
                let mut request = request;
                worker.execute(&mut request);
                request
            })
            .await
            .map_err(|e| e.to_string());

            guard.queue.push(Completion {
                op,
                deferred,
                outcome,
            });
            drop(guard);
        });

        Ok(promise)
    }

    /// Complete every finished request. Must be called from the host thread.
    pub fn poll_completions(&self) -> usize {
        let mut handled = 0;
        for completion in self.completions.try_iter() {
            complete(completion);
            handled += 1;
        }
        handled
    }

    /// Whether any request has not completed yet
    pub fn has_pending(&self) -> bool {
        self.queue.inflight.load(Ordering::Acquire) > 0 || !self.completions.is_empty()
    }

    /// Drive completions until no request is left in flight
    pub async fn run_until_idle(&self) {
        while self.has_pending() {
            if self.poll_completions() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    /// Drive completions and wait for `promise` to settle
    pub async fn settle(&self, promise: Promise) -> StorageResult<JsValue> {
        self.run_until_idle().await;
        promise.await
    }

    /// Path of the backing store as currently resolved by the context
    pub fn store_path(&self) -> StorageResult<PathBuf> {
        self.worker.store_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JsFunction;
    use serde_json::json;
    use tempfile::TempDir;

    fn bridge() -> (TempDir, PreferenceBridge) {
        let dir = TempDir::new().unwrap();
        let bridge = PreferenceBridge::new(StorageConfig::new().preferences_dir(dir.path()));
        (dir, bridge)
    }

    #[test]
    fn test_check_len_boundaries() {
        let at_limit = "k".repeat(MAX_KEY_LENGTH);
        let over = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(check_len(&at_limit, MAX_KEY_LENGTH, ResultCode::KeyExceedLengthLimit).is_ok());
        assert_eq!(
            check_len(&over, MAX_KEY_LENGTH, ResultCode::KeyExceedLengthLimit),
            Err(ResultCode::KeyExceedLengthLimit)
        );
    }

    #[test]
    fn test_length_checks_skip_store() {
        let worker = Worker {
            context: Arc::new(StaticContext::new("")),
            file_name: "default.xml".to_string(),
        };
        let options = JsValue::from(json!({ "key": "k".repeat(33), "value": "v" }));
        let mut request = Request::parse(Operation::Set, &[options]).unwrap();
        worker.execute(&mut request);
        // an unusable context would have produced Error had the store been opened
        assert_eq!(request.code, ResultCode::KeyExceedLengthLimit);
    }

    #[test]
    fn test_key_checked_before_value() {
        let (_dir, bridge) = bridge();
        let options = JsValue::from(json!({ "key": "k".repeat(33), "value": "v".repeat(129) }));
        let mut request = Request::parse(Operation::Set, &[options]).unwrap();
        bridge.worker.execute(&mut request);
        assert_eq!(request.code, ResultCode::KeyExceedLengthLimit);
    }

    #[test]
    fn test_no_runtime() {
        let (_dir, bridge) = bridge();
        let options = JsValue::from(json!({ "key": "k" }));
        assert_eq!(
            bridge.get(&[options]).unwrap_err(),
            StorageError::NoRuntime
        );
        assert!(!bridge.has_pending());
    }

    #[tokio::test]
    async fn test_promise_resolves_undefined() {
        let (_dir, bridge) = bridge();
        let options = JsValue::from(json!({ "key": "k", "value": "v" }));
        let promise = bridge.set(&[options]).unwrap();
        assert!(bridge.has_pending());
        assert_eq!(bridge.settle(promise).await, Ok(JsValue::Undefined));
        assert!(!bridge.has_pending());
    }

    #[tokio::test]
    async fn test_callbacks_released_after_completion() {
        let (_dir, bridge) = bridge();
        let complete = JsFunction::new(|_| {});
        let options = JsValue::from(json!({ "key": "k" })).with("complete", complete.clone());
        let promise = bridge.get(&[options]).unwrap();
        assert_eq!(complete.handle_count(), 2);
        bridge.settle(promise).await.unwrap();
        assert_eq!(complete.handle_count(), 1);
    }

    #[test]
    fn test_runtime_shutdown_clears_pending() {
        let dir = TempDir::new().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let bridge = PreferenceBridge::new(
            StorageConfig::new()
                .preferences_dir(dir.path())
                .runtime(runtime.handle().clone()),
        );

        // the runtime is never driven, so the task is dropped unstarted
        let promise = bridge.clear(&[JsValue::from(json!({}))]).unwrap();
        assert!(bridge.has_pending());
        drop(runtime);
        assert!(!bridge.has_pending());
        assert_eq!(bridge.poll_completions(), 0);

        let other = tokio::runtime::Builder::new_current_thread().build().unwrap();
        assert_eq!(other.block_on(promise), Err(execute_failed()));
        other.block_on(bridge.run_until_idle());
    }
}
