//! # Kubernetes-backed Store

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{ArtifactStore, NamespaceLister, SourceStore, StoreError, StoreResult};
use crate::crd::{GlobalStatus, SourceKey, SourceObject};

/// Store implementation talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn describe<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> String {
    format!("{} {namespace}/{name}", K::kind(&()))
}

#[async_trait]
impl NamespaceLister for KubeStore {
    async fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list_metadata(&ListParams::default())
            .await
            .map_err(|e| StoreError::from_kube(e, "Namespace list"))?;
        Ok(list.items.iter().map(ResourceExt::name_any).collect())
    }
}

#[async_trait]
impl<O> ArtifactStore<O> for KubeStore
where
    O: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get_artifact(&self, namespace: &str, name: &str) -> StoreResult<Option<O>> {
        let api: Api<O> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(e, describe::<O>(namespace, name)))
    }

    async fn create_artifact(&self, artifact: &O) -> StoreResult<()> {
        let namespace = artifact.namespace().unwrap_or_default();
        let name = artifact.name_any();
        let api: Api<O> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), artifact)
            .await
            .map_err(|e| StoreError::from_kube(e, describe::<O>(&namespace, &name)))?;
        Ok(())
    }

    async fn delete_artifact(&self, namespace: &str, name: &str) -> StoreResult<()> {
        let api: Api<O> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("{} already absent", describe::<O>(namespace, name));
                Ok(())
            }
            Err(e) => Err(StoreError::from_kube(e, describe::<O>(namespace, name))),
        }
    }

    async fn list_artifacts_by_owner(
        &self,
        owner_label: &str,
        owner_uid: &str,
    ) -> StoreResult<Vec<O>> {
        let api: Api<O> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&format!("{owner_label}={owner_uid}"));
        let list = api.list(&params).await.map_err(|e| {
            StoreError::from_kube(e, format!("{} list for owner {owner_uid}", O::kind(&())))
        })?;
        Ok(list.items)
    }
}

#[async_trait]
impl<S: SourceObject> SourceStore<S> for KubeStore {
    async fn get_source(&self, key: &SourceKey) -> StoreResult<Option<S>> {
        let api: Api<S> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, describe::<S>(&key.namespace, &key.name)))
    }

    async fn update_source(&self, source: &S) -> StoreResult<S> {
        let key = source.key();
        let api: Api<S> = Api::namespaced(self.client.clone(), &key.namespace);
        api.replace(&key.name, &PostParams::default(), source)
            .await
            .map_err(|e| StoreError::from_kube(e, describe::<S>(&key.namespace, &key.name)))
    }

    async fn patch_status(&self, key: &SourceKey, status: &GlobalStatus) -> StoreResult<()> {
        let api: Api<S> = Api::namespaced(self.client.clone(), &key.namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, describe::<S>(&key.namespace, &key.name)))?;
        Ok(())
    }
}
