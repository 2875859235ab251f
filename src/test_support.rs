//! In-memory adapters shared across unit and integration tests.
//!
//! Each double implements one backend trait without network access and
//! records the calls it receives so tests can assert on attempt counts and
//! side effects.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{
    BackendFuture, FunctionApi, FunctionApiError, ObjectLocator, ObjectStore, ObjectSummary,
    StackApi, StackApiError, StackDescriptor, StackOutput, StackStatus, StoreError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Object store kept in memory.
///
/// Listings are served from scripted responses first, in FIFO order; once
/// the script runs out the store lists the objects actually written to it.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<ObjectLocator, Vec<u8>>,
    listings: VecDeque<Vec<ObjectSummary>>,
    list_calls: u32,
    uploads: Vec<ObjectLocator>,
    deletions: Vec<ObjectLocator>,
    fail_puts: bool,
    fail_lists: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the response for the next scripted list call.
    pub fn push_listing(&self, objects: Vec<ObjectSummary>) {
        lock(&self.state).listings.push_back(objects);
    }

    /// Writes an object directly, bypassing call recording.
    pub fn insert(&self, container: &str, key: &str, body: &[u8]) {
        lock(&self.state)
            .objects
            .insert(ObjectLocator::new(container, key), body.to_vec());
    }

    /// Returns the stored bytes for an object.
    #[must_use]
    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .objects
            .get(&ObjectLocator::new(container, key))
            .cloned()
    }

    /// Makes every subsequent put fail with a transfer error.
    pub fn fail_puts(&self) {
        lock(&self.state).fail_puts = true;
    }

    /// Makes every subsequent list fail with a transfer error.
    pub fn fail_lists(&self) {
        lock(&self.state).fail_lists = true;
    }

    /// Number of list calls served so far.
    #[must_use]
    pub fn list_calls(&self) -> u32 {
        lock(&self.state).list_calls
    }

    /// Every locator written through [`ObjectStore::put`], in call order.
    #[must_use]
    pub fn uploads(&self) -> Vec<ObjectLocator> {
        lock(&self.state).uploads.clone()
    }

    /// Every locator passed to [`ObjectStore::delete`], in call order.
    #[must_use]
    pub fn deletions(&self) -> Vec<ObjectLocator> {
        lock(&self.state).deletions.clone()
    }
}

impl ObjectStore for MemoryStore {
    fn put<'a>(
        &'a self,
        locator: &'a ObjectLocator,
        body: &'a [u8],
    ) -> BackendFuture<'a, (), StoreError> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if state.fail_puts {
                return Err(StoreError::transfer(
                    "put",
                    &locator.container,
                    "simulated transfer failure",
                ));
            }
            state.uploads.push(locator.clone());
            state.objects.insert(locator.clone(), body.to_vec());
            Ok(())
        })
    }

    fn list<'a>(
        &'a self,
        container: &'a str,
        prefix: &'a str,
    ) -> BackendFuture<'a, Vec<ObjectSummary>, StoreError> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if state.fail_lists {
                return Err(StoreError::transfer(
                    "list",
                    container,
                    "simulated transfer failure",
                ));
            }
            state.list_calls += 1;
            if let Some(scripted) = state.listings.pop_front() {
                return Ok(scripted);
            }
            Ok(state
                .objects
                .iter()
                .filter(|(locator, _)| {
                    locator.container == container && locator.key.starts_with(prefix)
                })
                .map(|(locator, body)| {
                    let size = u64::try_from(body.len()).unwrap_or(u64::MAX);
                    ObjectSummary::new(locator.key.clone(), size)
                })
                .collect())
        })
    }

    fn delete<'a>(
        &'a self,
        container: &'a str,
        keys: &'a [String],
    ) -> BackendFuture<'a, (), StoreError> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            for key in keys {
                let locator = ObjectLocator::new(container, key);
                state.objects.remove(&locator);
                state.deletions.push(locator);
            }
            Ok(())
        })
    }
}

/// Stack API that replays scripted status codes.
///
/// Once the script runs out every further status check reports
/// `CREATE_IN_PROGRESS`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedStackApi {
    state: Arc<Mutex<StackState>>,
}

#[derive(Debug, Default)]
struct StackState {
    existing: BTreeSet<String>,
    statuses: VecDeque<StackStatus>,
    outputs: Vec<StackOutput>,
    submissions: Vec<StackDescriptor>,
    status_calls: u32,
    transport_failure: Option<String>,
}

impl ScriptedStackApi {
    /// Creates an API with no stacks and no scripted statuses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a status for the next status check.
    pub fn push_status(&self, status: StackStatus) {
        lock(&self.state).statuses.push_back(status);
    }

    /// Declares an output returned once the stack completes.
    pub fn push_output(&self, key: &str, value: &str) {
        lock(&self.state).outputs.push(StackOutput::new(key, value));
    }

    /// Marks a stack name as already taken.
    pub fn add_existing(&self, name: &str) {
        lock(&self.state).existing.insert(name.to_owned());
    }

    /// Makes every call fail as if the platform were unreachable.
    pub fn fail_transport(&self, message: &str) {
        lock(&self.state).transport_failure = Some(message.to_owned());
    }

    /// Number of status checks performed.
    #[must_use]
    pub fn status_calls(&self) -> u32 {
        lock(&self.state).status_calls
    }

    /// Descriptors submitted so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<StackDescriptor> {
        lock(&self.state).submissions.clone()
    }
}

impl StackApi for ScriptedStackApi {
    fn submit_template<'a>(
        &'a self,
        descriptor: &'a StackDescriptor,
    ) -> BackendFuture<'a, (), StackApiError> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(message) = state.transport_failure.clone() {
                return Err(StackApiError::Transport { message });
            }
            if !state.existing.insert(descriptor.name.clone()) {
                return Err(StackApiError::AlreadyExists {
                    stack: descriptor.name.clone(),
                });
            }
            state.submissions.push(descriptor.clone());
            Ok(())
        })
    }

    fn stack_status<'a>(&'a self, name: &'a str) -> BackendFuture<'a, StackStatus, StackApiError> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if !state.existing.contains(name) {
                return Err(StackApiError::NotFound {
                    stack: name.to_owned(),
                });
            }
            state.status_calls += 1;
            Ok(state
                .statuses
                .pop_front()
                .unwrap_or_else(|| StackStatus::new("CREATE_IN_PROGRESS")))
        })
    }

    fn describe_outputs<'a>(
        &'a self,
        name: &'a str,
    ) -> BackendFuture<'a, Vec<StackOutput>, StackApiError> {
        Box::pin(async move {
            let state = lock(&self.state);
            if !state.existing.contains(name) {
                return Err(StackApiError::NotFound {
                    stack: name.to_owned(),
                });
            }
            Ok(state.outputs.clone())
        })
    }
}

/// One recorded [`FunctionApi::set_code_source`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CodeSourceUpdate {
    /// Function that was repointed.
    pub function: String,
    /// Bucket holding the artifact.
    pub bucket: String,
    /// Artifact key.
    pub key: String,
}

/// Function API that only knows the functions registered with it.
#[derive(Clone, Debug, Default)]
pub struct RecordingFunctionApi {
    state: Arc<Mutex<FunctionState>>,
}

#[derive(Debug, Default)]
struct FunctionState {
    known: BTreeSet<String>,
    updates: Vec<CodeSourceUpdate>,
}

impl RecordingFunctionApi {
    /// Creates an API that recognises the given function names.
    #[must_use]
    pub fn with_functions(names: &[&str]) -> Self {
        let api = Self::default();
        lock(&api.state)
            .known
            .extend(names.iter().map(|name| (*name).to_owned()));
        api
    }

    /// Successful updates in call order.
    #[must_use]
    pub fn updates(&self) -> Vec<CodeSourceUpdate> {
        lock(&self.state).updates.clone()
    }
}

impl FunctionApi for RecordingFunctionApi {
    fn set_code_source<'a>(
        &'a self,
        function: &'a str,
        bucket: &'a str,
        key: &'a str,
    ) -> BackendFuture<'a, (), FunctionApiError> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if !state.known.contains(function) {
                return Err(FunctionApiError::Rejected {
                    function: function.to_owned(),
                    message: String::from("Function not found"),
                });
            }
            state.updates.push(CodeSourceUpdate {
                function: function.to_owned(),
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
            Ok(())
        })
    }
}
