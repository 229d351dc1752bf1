//! Common test utilities
//!
//! `ClusterStore` is an in-memory cluster implementing every collaborator
//! trait of the reconciler. It counts calls and can inject failures per
//! namespace so partial convergence and retries can be exercised without an
//! API server.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use global_config_controller::artifact::{ArtifactKind, ConfigMapKind, SecretKind};
use global_config_controller::config::{ControllerConfig, SharedControllerConfig};
use global_config_controller::controller::reconciler::Reconciler;
use global_config_controller::crd::{
    GlobalConfig, GlobalConfigSpec, GlobalSecret, GlobalSecretSpec, GlobalStatus, NamespacesRegex,
    SecretType, SourceKey,
};
use global_config_controller::store::{
    ArtifactStore, NamespaceLister, SourceStore, StoreError, StoreResult,
};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};

type Key = (String, String);

/// Calls observed by the store, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calls {
    pub list_namespaces: usize,
    /// Successful artifact creates as `namespace/name`
    pub created: Vec<String>,
    /// Artifact deletes that removed something, as `namespace/name`
    pub deleted: Vec<String>,
    /// Every artifact delete attempt, including injected failures
    pub delete_attempts: usize,
    pub source_updates: usize,
    pub status_patches: usize,
}

#[derive(Debug, Default)]
struct Faults {
    /// namespace -> remaining injected delete failures
    deletes: HashMap<String, usize>,
    /// namespace -> remaining injected create failures
    creates: HashMap<String, usize>,
    /// namespace -> marker of the object a concurrent writer creates first
    /// (`None` writes exactly what the caller asked for)
    create_races: HashMap<String, Option<String>>,
    /// namespace -> delay before the next create there is served
    create_stalls: HashMap<String, Duration>,
    namespace_lists: usize,
    source_conflicts: usize,
}

#[derive(Debug, Default)]
pub struct State {
    namespaces: Vec<String>,
    config_maps: BTreeMap<Key, ConfigMap>,
    secrets: BTreeMap<Key, Secret>,
    global_configs: BTreeMap<Key, GlobalConfig>,
    global_secrets: BTreeMap<Key, GlobalSecret>,
    next_version: u64,
    next_uid: u64,
    calls: Calls,
    faults: Faults,
}

impl State {
    fn stamp<O: Resource>(&mut self, object: &mut O) {
        self.next_version += 1;
        object.meta_mut().resource_version = Some(self.next_version.to_string());
    }

    fn assign_uid<O: Resource>(&mut self, object: &mut O) {
        if object.meta().uid.is_none() {
            self.next_uid += 1;
            object.meta_mut().uid = Some(format!("uid-{}", self.next_uid));
        }
    }
}

/// Object kinds the in-memory cluster can hold
pub trait Stored: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    fn bucket(state: &mut State) -> &mut BTreeMap<Key, Self>;

    fn set_status(&mut self, _status: GlobalStatus) {}
}

impl Stored for ConfigMap {
    fn bucket(state: &mut State) -> &mut BTreeMap<Key, Self> {
        &mut state.config_maps
    }
}

impl Stored for Secret {
    fn bucket(state: &mut State) -> &mut BTreeMap<Key, Self> {
        &mut state.secrets
    }
}

impl Stored for GlobalConfig {
    fn bucket(state: &mut State) -> &mut BTreeMap<Key, Self> {
        &mut state.global_configs
    }

    fn set_status(&mut self, status: GlobalStatus) {
        self.status = Some(status);
    }
}

impl Stored for GlobalSecret {
    fn bucket(state: &mut State) -> &mut BTreeMap<Key, Self> {
        &mut state.global_secrets
    }

    fn set_status(&mut self, status: GlobalStatus) {
        self.status = Some(status);
    }
}

fn key_of<O: Resource>(object: &O) -> Key {
    (object.namespace().unwrap_or_default(), object.name_any())
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn describe(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// In-memory cluster
#[derive(Debug, Default)]
pub struct ClusterStore {
    state: Mutex<State>,
}

impl ClusterStore {
    pub fn with_namespaces(namespaces: &[&str]) -> Arc<Self> {
        let store = Self::default();
        store.add_namespaces(namespaces);
        Arc::new(store)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("cluster state poisoned")
    }

    pub fn add_namespaces(&self, namespaces: &[&str]) {
        let mut state = self.lock();
        for namespace in namespaces {
            if !state.namespaces.iter().any(|n| n == namespace) {
                state.namespaces.push((*namespace).to_string());
            }
        }
    }

    pub fn remove_namespace(&self, namespace: &str) {
        let mut state = self.lock();
        state.namespaces.retain(|n| n != namespace);
        state.config_maps.retain(|(ns, _), _| ns != namespace);
        state.secrets.retain(|(ns, _), _| ns != namespace);
    }

    /// Store a source as the API server would on create
    pub fn put_source<S: Stored>(&self, mut source: S) -> S {
        let mut state = self.lock();
        state.assign_uid(&mut source);
        if source.meta().generation.is_none() {
            source.meta_mut().generation = Some(1);
        }
        state.stamp(&mut source);
        S::bucket(&mut state).insert(key_of(&source), source.clone());
        source
    }

    pub fn source<S: Stored>(&self, namespace: &str, name: &str) -> Option<S> {
        let mut state = self.lock();
        S::bucket(&mut state).get(&key(namespace, name)).cloned()
    }

    /// Apply a spec change; bumps the generation like the API server does
    pub fn edit_source<S: Stored>(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut S)) {
        let mut state = self.lock();
        let Some(mut source) = S::bucket(&mut state).get(&key(namespace, name)).cloned() else {
            panic!("no source {namespace}/{name}");
        };
        edit(&mut source);
        source.meta_mut().generation = Some(source.meta().generation.unwrap_or(0) + 1);
        state.stamp(&mut source);
        S::bucket(&mut state).insert(key(namespace, name), source);
    }

    /// Mark a source for deletion; it disappears at once when it has no finalizers
    pub fn request_deletion<S: Stored>(&self, namespace: &str, name: &str) {
        let mut state = self.lock();
        let bucket = S::bucket(&mut state);
        let Some(source) = bucket.get_mut(&key(namespace, name)) else {
            return;
        };
        if source.finalizers().is_empty() {
            bucket.remove(&key(namespace, name));
            return;
        }
        let now: Time = serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z"))
            .expect("valid timestamp");
        source.meta_mut().deletion_timestamp = Some(now);
        let mut source = source.clone();
        state.stamp(&mut source);
        S::bucket(&mut state).insert(key(namespace, name), source);
    }

    pub fn put_artifact<O: Stored>(&self, mut artifact: O) {
        let mut state = self.lock();
        state.assign_uid(&mut artifact);
        state.stamp(&mut artifact);
        O::bucket(&mut state).insert(key_of(&artifact), artifact);
    }

    pub fn artifact<O: Stored>(&self, namespace: &str, name: &str) -> Option<O> {
        let mut state = self.lock();
        O::bucket(&mut state).get(&key(namespace, name)).cloned()
    }

    /// Namespaces holding an artifact of this kind named `name`
    pub fn artifact_namespaces<O: Stored>(&self, name: &str) -> Vec<String> {
        let mut state = self.lock();
        O::bucket(&mut state)
            .keys()
            .filter(|(_, n)| n == name)
            .map(|(ns, _)| ns.clone())
            .collect()
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.lock().calls = Calls::default();
    }

    pub fn fail_deletes_in(&self, namespace: &str, times: usize) {
        self.lock()
            .faults
            .deletes
            .insert(namespace.to_string(), times);
    }

    pub fn fail_creates_in(&self, namespace: &str, times: usize) {
        self.lock()
            .faults
            .creates
            .insert(namespace.to_string(), times);
    }

    /// Let a concurrent writer win the next create in `namespace`
    pub fn race_create_in(&self, namespace: &str, marker: Option<&str>) {
        self.lock()
            .faults
            .create_races
            .insert(namespace.to_string(), marker.map(ToString::to_string));
    }

    /// Hold the next create in `namespace` for `delay`, like an unresponsive API server
    pub fn stall_creates_in(&self, namespace: &str, delay: Duration) {
        self.lock()
            .faults
            .create_stalls
            .insert(namespace.to_string(), delay);
    }

    pub fn fail_namespace_lists(&self, times: usize) {
        self.lock().faults.namespace_lists = times;
    }

    pub fn conflict_source_updates(&self, times: usize) {
        self.lock().faults.source_conflicts = times;
    }
}

fn take_fault(faults: &mut HashMap<String, usize>, namespace: &str) -> bool {
    match faults.get_mut(namespace) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl NamespaceLister for ClusterStore {
    async fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        let mut state = self.lock();
        state.calls.list_namespaces += 1;
        if state.faults.namespace_lists > 0 {
            state.faults.namespace_lists -= 1;
            return Err(StoreError::Transient("Namespace list: connection reset".to_string()));
        }
        Ok(state.namespaces.clone())
    }
}

#[async_trait]
impl<O: Stored> ArtifactStore<O> for ClusterStore {
    async fn get_artifact(&self, namespace: &str, name: &str) -> StoreResult<Option<O>> {
        let mut state = self.lock();
        Ok(O::bucket(&mut state).get(&key(namespace, name)).cloned())
    }

    async fn create_artifact(&self, artifact: &O) -> StoreResult<()> {
        let (namespace, name) = key_of(artifact);
        let stall = self.lock().faults.create_stalls.remove(&namespace);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();

        if let Some(marker) = state.faults.create_races.remove(&namespace) {
            let mut winner = artifact.clone();
            if let Some(marker) = marker {
                for value in winner.annotations_mut().values_mut() {
                    value.clone_from(&marker);
                }
            }
            state.assign_uid(&mut winner);
            state.stamp(&mut winner);
            O::bucket(&mut state).insert(key(&namespace, &name), winner);
            return Err(StoreError::AlreadyExists(describe(&namespace, &name)));
        }
        if take_fault(&mut state.faults.creates, &namespace) {
            return Err(StoreError::Transient(format!(
                "{}: injected create failure",
                describe(&namespace, &name)
            )));
        }
        if !state.namespaces.contains(&namespace) {
            return Err(StoreError::NotFound(format!("Namespace {namespace}")));
        }
        if O::bucket(&mut state).contains_key(&key(&namespace, &name)) {
            return Err(StoreError::AlreadyExists(describe(&namespace, &name)));
        }

        let mut created = artifact.clone();
        state.assign_uid(&mut created);
        state.stamp(&mut created);
        O::bucket(&mut state).insert(key(&namespace, &name), created);
        state.calls.created.push(describe(&namespace, &name));
        Ok(())
    }

    async fn delete_artifact(&self, namespace: &str, name: &str) -> StoreResult<()> {
        let mut state = self.lock();
        state.calls.delete_attempts += 1;
        if take_fault(&mut state.faults.deletes, namespace) {
            return Err(StoreError::Transient(format!(
                "{}: injected delete failure",
                describe(namespace, name)
            )));
        }
        if O::bucket(&mut state).remove(&key(namespace, name)).is_some() {
            state.calls.deleted.push(describe(namespace, name));
        }
        Ok(())
    }

    async fn list_artifacts_by_owner(
        &self,
        owner_label: &str,
        owner_uid: &str,
    ) -> StoreResult<Vec<O>> {
        let mut state = self.lock();
        Ok(O::bucket(&mut state)
            .values()
            .filter(|o| o.labels().get(owner_label).map(String::as_str) == Some(owner_uid))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl<S: Stored> SourceStore<S> for ClusterStore {
    async fn get_source(&self, key: &SourceKey) -> StoreResult<Option<S>> {
        let mut state = self.lock();
        Ok(S::bucket(&mut state)
            .get(&(key.namespace.clone(), key.name.clone()))
            .cloned())
    }

    async fn update_source(&self, source: &S) -> StoreResult<S> {
        let mut state = self.lock();
        state.calls.source_updates += 1;
        let key = key_of(source);
        let what = describe(&key.0, &key.1);

        if state.faults.source_conflicts > 0 {
            state.faults.source_conflicts -= 1;
            // Someone else wrote the object meanwhile
            if let Some(mut stored) = S::bucket(&mut state).get(&key).cloned() {
                state.stamp(&mut stored);
                S::bucket(&mut state).insert(key.clone(), stored);
            }
            return Err(StoreError::Conflict(what));
        }

        let Some(stored) = S::bucket(&mut state).get(&key).cloned() else {
            return Err(StoreError::NotFound(what));
        };
        if stored.meta().resource_version != source.meta().resource_version {
            return Err(StoreError::Conflict(what));
        }

        let mut updated = source.clone();
        // Server-owned fields
        updated.meta_mut().generation = stored.meta().generation;
        updated
            .meta_mut()
            .deletion_timestamp
            .clone_from(&stored.meta().deletion_timestamp);
        state.stamp(&mut updated);

        if updated.meta().deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            S::bucket(&mut state).remove(&key);
        } else {
            S::bucket(&mut state).insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn patch_status(&self, key: &SourceKey, status: &GlobalStatus) -> StoreResult<()> {
        let mut state = self.lock();
        state.calls.status_patches += 1;
        let map_key = (key.namespace.clone(), key.name.clone());
        let Some(mut stored) = S::bucket(&mut state).get(&map_key).cloned() else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        stored.set_status(status.clone());
        state.stamp(&mut stored);
        S::bucket(&mut state).insert(map_key, stored);
        Ok(())
    }
}

pub fn shared_config() -> SharedControllerConfig {
    Arc::new(tokio::sync::RwLock::new(ControllerConfig::default()))
}

/// Reconciler context backed by the in-memory cluster
pub fn reconciler<K: ArtifactKind>(store: &Arc<ClusterStore>) -> Reconciler<K>
where
    ClusterStore: SourceStore<K::Source> + ArtifactStore<K::Object>,
{
    Reconciler::with_stores(
        Arc::clone(store) as Arc<dyn SourceStore<K::Source>>,
        Arc::clone(store) as Arc<dyn ArtifactStore<K::Object>>,
        Arc::clone(store) as Arc<dyn NamespaceLister>,
        shared_config(),
    )
}

pub fn config_reconciler(store: &Arc<ClusterStore>) -> Reconciler<ConfigMapKind> {
    reconciler::<ConfigMapKind>(store)
}

pub fn secret_reconciler(store: &Arc<ClusterStore>) -> Reconciler<SecretKind> {
    reconciler::<SecretKind>(store)
}

pub fn namespaces(avoid: &[&str], matches: &[&str]) -> NamespacesRegex {
    NamespacesRegex {
        avoid_regex: avoid.iter().map(ToString::to_string).collect(),
        match_regex: matches.iter().map(ToString::to_string).collect(),
    }
}

pub fn global_config(
    namespace: &str,
    name: &str,
    selection: NamespacesRegex,
    data: &[(&str, &str)],
) -> GlobalConfig {
    let mut source = GlobalConfig::new(
        name,
        GlobalConfigSpec {
            namespaces: selection,
            data: data
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        },
    );
    source.metadata.namespace = Some(namespace.to_string());
    source
}

/// A `GlobalSecret` whose values are base64 encoded from the given plain text
pub fn global_secret(
    namespace: &str,
    name: &str,
    selection: NamespacesRegex,
    secret_type: SecretType,
    data: &[(&str, &str)],
) -> GlobalSecret {
    let mut source = GlobalSecret::new(
        name,
        GlobalSecretSpec {
            immutable: true,
            namespaces: selection,
            secret_type,
            data: data
                .iter()
                .map(|(k, v)| ((*k).to_string(), STANDARD.encode(v)))
                .collect(),
        },
    );
    source.metadata.namespace = Some(namespace.to_string());
    source
}

/// A ConfigMap written by someone else
pub fn foreign_config_map(namespace: &str, name: &str) -> ConfigMap {
    let mut config_map = ConfigMap::default();
    config_map.metadata.namespace = Some(namespace.to_string());
    config_map.metadata.name = Some(name.to_string());
    config_map.data = Some(BTreeMap::from([("owner".to_string(), "someone-else".to_string())]));
    config_map
}
