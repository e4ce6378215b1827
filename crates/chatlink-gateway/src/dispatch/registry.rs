//! Event registry and dispatch
//!
//! Handlers are registered before connecting; the registry is then frozen
//! behind an `Arc` and shared with every dispatch task. Registrations are
//! indexed as `name -> priority -> handlers`, lowest priority first and
//! registration order within a priority.

use super::context::Context;
use super::handler::{EventHandler, HandlerError, Propagation, Severity};
use super::predicate::{predicate, Predicate};
use super::waiter::{WaitError, Waiters};
use chatlink_core::{EventTags, EventType, Intents};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Priority handlers get unless told otherwise
pub const DEFAULT_PRIORITY: i32 = 100;

#[derive(Debug, Clone)]
enum Target {
    Event(EventType),
    Raw(String),
}

/// A handler plus where and when it runs
///
/// ```ignore
/// registry.register(
///     Registration::new(EventType::MessageCreate, handler_fn(on_message))
///         .priority(10)
///         .predicate(|data| data["content"] == "!ping")
///         .label("ping"),
/// );
/// ```
pub struct Registration {
    targets: Vec<Target>,
    tags: EventTags,
    handler: Arc<dyn EventHandler>,
    priority: i32,
    predicates: Vec<Predicate>,
    optional: bool,
    label: Option<String>,
}

impl Registration {
    pub fn new(event: EventType, handler: impl EventHandler + 'static) -> Self {
        Self::with_target(Target::Event(event), Arc::new(handler))
    }

    /// Register under an arbitrary name; contributes no intents
    pub fn raw(name: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        Self::with_target(Target::Raw(name.into()), Arc::new(handler))
    }

    fn with_target(target: Target, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            targets: vec![target],
            tags: EventTags::empty(),
            handler,
            priority: DEFAULT_PRIORITY,
            predicates: Vec::new(),
            optional: false,
            label: None,
        }
    }

    /// Also run this handler for `event`
    #[must_use]
    pub fn also(mut self, event: EventType) -> Self {
        self.targets.push(Target::Event(event));
        self
    }

    /// Only run for payloads carrying these tags (`DIRECT_MESSAGE_CREATE`)
    #[must_use]
    pub fn tagged(mut self, tags: EventTags) -> Self {
        self.tags = tags;
        self
    }

    /// Lower runs first
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Run only when `f` accepts the payload
    #[must_use]
    pub fn predicate<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.shared_predicate(predicate(f))
    }

    /// Add a predicate that may be shared with other registrations
    ///
    /// A shared predicate is evaluated once per dispatch.
    #[must_use]
    pub fn shared_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Do not request the intents this handler's events need
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Name used in logs
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn names(&self) -> Vec<String> {
        self.targets
            .iter()
            .map(|target| match target {
                Target::Event(event) => self.tags.apply(event.as_str()),
                Target::Raw(name) => name.clone(),
            })
            .collect()
    }

    fn default_label(&self) -> String {
        self.names().join("|")
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("names", &self.names())
            .field("priority", &self.priority)
            .field("predicates", &self.predicates.len())
            .field("optional", &self.optional)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

struct Entry {
    seq: u64,
    label: String,
    handler: Arc<dyn EventHandler>,
    predicates: Vec<Predicate>,
}

/// Registered handlers, their intents, and pending waiters
#[derive(Default)]
pub struct EventRegistry {
    handlers: HashMap<String, BTreeMap<i32, Vec<Arc<Entry>>>>,
    intents: Intents,
    waiters: Arc<Waiters>,
    next_seq: u64,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration under each of its names
    pub fn register(&mut self, registration: Registration) -> &mut Self {
        if !registration.optional {
            for target in &registration.targets {
                if let Target::Event(event) = target {
                    self.intents |= event.required_intents(registration.tags);
                }
            }
        }

        let names = registration.names();
        let entry = Arc::new(Entry {
            seq: self.next_seq,
            label: registration
                .label
                .clone()
                .unwrap_or_else(|| registration.default_label()),
            handler: registration.handler,
            predicates: registration.predicates,
        });
        self.next_seq += 1;

        for name in names {
            tracing::debug!(event = %name, label = %entry.label, priority = registration.priority, "Handler registered");
            self.handlers
                .entry(name)
                .or_default()
                .entry(registration.priority)
                .or_default()
                .push(Arc::clone(&entry));
        }
        self
    }

    /// Intents required by every non-optional registration
    #[must_use]
    pub fn intents(&self) -> Intents {
        self.intents
    }

    /// Number of handlers registered under exactly `name`
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .get(name)
            .map_or(0, |by_priority| by_priority.values().map(Vec::len).sum())
    }

    /// Wait for the next `event` whose payload satisfies `predicate`
    pub async fn wait_for(
        &self,
        event: impl AsRef<str>,
        predicate: Predicate,
        timeout: Duration,
    ) -> Result<Arc<Value>, WaitError> {
        self.waiters.wait_for(event.as_ref(), predicate, timeout).await
    }

    /// Fail every pending wait with [`WaitError::Cancelled`]
    pub fn cancel_waiters(&self) {
        self.waiters.cancel_all();
    }

    pub(crate) fn waiters(&self) -> Arc<Waiters> {
        Arc::clone(&self.waiters)
    }

    /// Run the handlers for one dispatched event, then resolve a waiter
    ///
    /// Handlers from every name the payload answers to run as one sequence
    /// ordered by priority, then by how specific the name is, then by
    /// registration order. Handler failures and panics are logged and never
    /// propagate. Returns the number of handlers invoked.
    pub async fn dispatch(&self, ctx: Context, event: &str, data: Value) -> usize {
        let tags = EventType::from_str(event)
            .map(|kind| EventTags::classify(kind, &data))
            .unwrap_or_default();
        let candidates = tags.candidate_names(event);
        let data = Arc::new(data);

        let mut invoked = 0;
        let mut verdicts: HashMap<usize, bool> = HashMap::new();

        for entry in self.ordered_entries(&candidates) {
            if !entry
                .predicates
                .iter()
                .all(|p| evaluate(p, &data, &mut verdicts, &entry.label, event))
            {
                continue;
            }

            invoked += 1;
            let outcome = AssertUnwindSafe(entry.handler.handle(ctx.clone(), Arc::clone(&data)))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(Propagation::Continue)) => {}
                Ok(Ok(Propagation::Stop)) => {
                    tracing::trace!(event, label = %entry.label, "Propagation stopped");
                    break;
                }
                Ok(Err(e)) => log_handler_error(event, &entry.label, &e),
                Err(panic) => {
                    tracing::error!(
                        event,
                        label = %entry.label,
                        panic = %panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        self.waiters.resolve(&candidates, &data);
        invoked
    }

    /// Entries for all candidate names, merged and deduplicated
    fn ordered_entries(&self, candidates: &[String]) -> Vec<Arc<Entry>> {
        let mut merged: Vec<(i32, usize, Arc<Entry>)> = Vec::new();
        for (specificity, name) in candidates.iter().enumerate() {
            let Some(by_priority) = self.handlers.get(name) else {
                continue;
            };
            for (priority, entries) in by_priority {
                merged.extend(entries.iter().map(|e| (*priority, specificity, Arc::clone(e))));
            }
        }
        merged.sort_by_key(|(priority, specificity, entry)| (*priority, *specificity, entry.seq));

        let mut seen = HashSet::new();
        merged
            .into_iter()
            .filter(|(_, _, entry)| seen.insert(entry.seq))
            .map(|(_, _, entry)| entry)
            .collect()
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.handlers.len())
            .field("intents", &self.intents)
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

/// Evaluate a predicate once per dispatch, keyed by its allocation
fn evaluate(
    predicate: &Predicate,
    data: &Value,
    verdicts: &mut HashMap<usize, bool>,
    label: &str,
    event: &str,
) -> bool {
    let key = Arc::as_ptr(predicate).cast::<()>() as usize;
    if let Some(verdict) = verdicts.get(&key) {
        return *verdict;
    }

    let verdict = std::panic::catch_unwind(AssertUnwindSafe(|| predicate(data))).unwrap_or_else(|panic| {
        tracing::error!(event, label, panic = %panic_message(panic.as_ref()), "Predicate panicked");
        false
    });
    verdicts.insert(key, verdict);
    verdict
}

fn log_handler_error(event: &str, label: &str, error: &HandlerError) {
    let detail = match error {
        HandlerError::Other(inner) => format!("{inner:#}"),
        other => other.to_string(),
    };
    match error.severity() {
        Severity::Info => tracing::info!(event, label, error = %detail, "Event handler gave up"),
        Severity::Warn => tracing::warn!(event, label, error = %detail, "Event handler failed"),
        Severity::Error => tracing::error!(event, label, error = %detail, "Event handler errored"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
