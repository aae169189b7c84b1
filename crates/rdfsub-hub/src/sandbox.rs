//! Isolated, time-limited evaluation of trigger predicates.
//!
//! Loaded trigger functions live in one [`Library`] per trigger. Each evaluation
//! runs on the blocking pool under a lowered [`AccessScope`], holds one
//! worker permit, and is interrupted once its deadline passes.

use std::{collections::HashMap, sync::Arc, time::Duration};

use rdfsub_core::term::Triple;
use rdfsub_script::{
  AccessLevel, AccessScope, EvalError, Function, Interrupt, Library, Value, call,
};
use thiserror::Error;
use tokio::{
  sync::{RwLock, Semaphore},
  time::{Instant, timeout, timeout_at},
};
use tracing::{debug, warn};

/// How long an interrupted evaluation gets to unwind before we stop waiting.
const INTERRUPT_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SandboxError {
  #[error("trigger returned a {0}, expected a boolean")]
  InvalidReturnType(&'static str),

  #[error("evaluation error: {0}")]
  EvaluationError(String),

  #[error("{0}")]
  SecurityViolation(String),

  #[error("evaluation exceeded {0:?}")]
  Timeout(Duration),
}

impl From<EvalError> for SandboxError {
  fn from(e: EvalError) -> Self {
    match e {
      EvalError::SecurityViolation { .. } => Self::SecurityViolation(e.to_string()),
      other => Self::EvaluationError(other.to_string()),
    }
  }
}

/// Inputs of one trigger evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
  pub subscription_id: Option<String>,
  /// Entry function to call; also the namespace the evaluation may see.
  pub trigger:         String,
  pub deleted:         Vec<Triple>,
  pub inserted:        Vec<Triple>,
}

impl EvaluationContext {
  pub fn new(trigger: impl Into<String>, deleted: Vec<Triple>, inserted: Vec<Triple>) -> Self {
    Self { subscription_id: None, trigger: trigger.into(), deleted, inserted }
  }

  pub fn for_subscription(self, id: impl Into<String>) -> Self {
    Self { subscription_id: Some(id.into()), ..self }
  }
}

// ─── Runtime ─────────────────────────────────────────────────────────────────

/// Shared state of every sandbox: the loaded triggers, the worker pool, and
/// the per-evaluation time limit.
///
/// Each trigger owns its own [`Library`], keyed by the trigger IRI, so
/// loading one trigger never touches the definitions of another, even when
/// one IRI extends the other.
#[derive(Clone)]
pub struct SandboxRuntime {
  triggers: Arc<RwLock<HashMap<String, Library>>>,
  workers:  Arc<Semaphore>,
  timeout:  Duration,
}

impl SandboxRuntime {
  pub fn new(workers: usize, timeout: Duration) -> Self {
    Self {
      triggers: Arc::new(RwLock::new(HashMap::new())),
      workers:  Arc::new(Semaphore::new(workers.max(1))),
      timeout,
    }
  }

  pub fn timeout(&self) -> Duration { self.timeout }

  /// A new evaluation context at [`AccessLevel::SuperUser`].
  pub fn sandbox(&self) -> Sandbox {
    Sandbox {
      runtime: self.clone(),
      scope:   Arc::new(AccessScope::new(AccessLevel::SuperUser)),
    }
  }

  /// Make `functions` the definitions of `trigger`. Returns the library it
  /// replaces, if any.
  pub async fn load(&self, trigger: &str, functions: Vec<Function>) -> Option<Library> {
    let library = Library::from_functions(functions);
    let mut triggers = self.triggers.write().await;
    let previous = triggers.insert(trigger.to_owned(), library);
    debug!(trigger, loaded = triggers.len(), "trigger loaded");
    previous
  }

  /// Put back what [`load`](Self::load) replaced.
  pub async fn restore(&self, trigger: &str, previous: Option<Library>) {
    match previous {
      Some(library) => {
        self.triggers.write().await.insert(trigger.to_owned(), library);
      }
      None => {
        self.unload(trigger).await;
      }
    }
  }

  /// Drop `trigger`. Returns how many definitions went.
  pub async fn unload(&self, trigger: &str) -> usize {
    self.triggers.write().await.remove(trigger).map_or(0, |library| library.len())
  }

  pub async fn is_loaded(&self, trigger: &str) -> bool {
    self.triggers.read().await.contains_key(trigger)
  }
}

// ─── Sandbox ─────────────────────────────────────────────────────────────────

/// One evaluation context with its own capability level.
pub struct Sandbox {
  runtime: SandboxRuntime,
  scope:   Arc<AccessScope>,
}

impl Sandbox {
  pub fn scope(&self) -> &Arc<AccessScope> { &self.scope }

  /// Evaluate a loaded trigger against a mutation.
  pub async fn invoke(&self, context: EvaluationContext) -> Result<bool, SandboxError> {
    let library =
      self.runtime.triggers.read().await.get(&context.trigger).cloned().unwrap_or_default();
    self.run(library, context).await
  }

  /// Evaluate freshly compiled `functions` once with no facts, without
  /// loading them.
  pub async fn trial(&self, trigger: &str, functions: Vec<Function>) -> Result<bool, SandboxError> {
    let library = Library::from_functions(functions);
    self.run(library, EvaluationContext::new(trigger, Vec::new(), Vec::new())).await
  }

  async fn run(&self, library: Library, context: EvaluationContext) -> Result<bool, SandboxError> {
    let permit = Arc::clone(&self.runtime.workers)
      .acquire_owned()
      .await
      .map_err(|_| SandboxError::EvaluationError("sandbox workers are shut down".into()))?;

    let limit = self.runtime.timeout;
    let deadline = Instant::now() + limit;
    let interrupt = Interrupt::new();
    let EvaluationContext { subscription_id, trigger, deleted, inserted } = context;

    // The guard travels with the evaluation so the level is only restored
    // once the worker has actually stopped.
    let guard = self.scope.lower(AccessLevel::Public);
    let scope = Arc::clone(&self.scope);
    let worker_interrupt = interrupt.clone();
    let entry = trigger.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
      let _permit = permit;
      let _guard = guard;
      let args = vec![Value::facts(deleted), Value::facts(inserted)];
      call(&library, &scope, &worker_interrupt, &entry, args)
    });

    let outcome = match timeout_at(deadline, &mut handle).await {
      Ok(joined) => joined,
      Err(_) => {
        interrupt.trigger();
        if timeout(INTERRUPT_GRACE, handle).await.is_err() {
          warn!(%trigger, "evaluation did not stop after interrupt");
        }
        warn!(%trigger, subscription = ?subscription_id, ?limit, "trigger timed out");
        return Err(SandboxError::Timeout(limit));
      }
    };

    match outcome {
      Ok(Ok(Value::Bool(fired))) => Ok(fired),
      Ok(Ok(other)) => Err(SandboxError::InvalidReturnType(other.type_name())),
      Ok(Err(EvalError::Interrupted)) => Err(SandboxError::Timeout(limit)),
      Ok(Err(e)) => Err(e.into()),
      Err(join) => Err(SandboxError::EvaluationError(format!("evaluation task failed: {join}"))),
    }
  }
}
