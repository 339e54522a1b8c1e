use std::fs;
use std::path::Path;

use azure_core::http::{Body, NoFormat, RequestContent, StatusCode};
use azure_identity::DefaultAzureCredential;
use azure_storage_blob::clients::{BlobContainerClient, BlobContainerClientOptions};
use azure_storage_blob::models::{
    BlobContainerClientListBlobFlatSegmentOptions, BlockBlobClientUploadOptions,
    ListBlobsFlatSegmentResponse,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::MirrorError;

/// Blocking view of one blob container. Implementations are constructed per
/// worker through a [`StoreFactory`]; nothing is shared between workers.
pub trait BlobStore {
    /// One flat list-objects call; true iff at least one object lives under
    /// `prefix`. Listing failures propagate and are never reported as
    /// "does not exist".
    fn exists_with_prefix(&self, prefix: &str) -> Result<bool, MirrorError>;

    /// Upload one local file as the object named `key`. Existing objects are
    /// not overwritten.
    fn put_file(&self, key: &str, source: &Path) -> Result<(), MirrorError>;
}

/// Injected capability that builds a fresh store handle. Workers call this
/// locally instead of sharing a connection, and tests substitute fakes.
pub trait StoreFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn BlobStore>, MirrorError>;
}

/// Namespace for one catalog entry: `{base}/{name-up-to-first-dot}`.
pub fn entry_prefix(base: &str, file_name: &str) -> String {
    format!("{base}/{}", crate::archive::archive_stem(file_name))
}

/// Whether a catalog entry was already fully processed on a previous run.
/// Any object under the entry's prefix counts as proof, which deliberately
/// tolerates the partial state a mid-upload failure leaves behind.
pub fn already_mirrored(
    store: &dyn BlobStore,
    base: &str,
    file_name: &str,
) -> Result<bool, MirrorError> {
    store.exists_with_prefix(&entry_prefix(base, file_name))
}

/// Blob container access through the Azure SDK, driven by an owned
/// current-thread runtime so the rest of the crate stays blocking.
pub struct AzureBlobStore {
    runtime: Runtime,
    container: BlobContainerClient,
}

impl AzureBlobStore {
    /// Connect with the ambient credential chain (environment, managed
    /// identity, CLI login).
    pub fn connect(account_url: &str, container_name: &str) -> Result<Self, MirrorError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| MirrorError::Storage(format!("tokio runtime: {err}")))?;
        let credential = DefaultAzureCredential::new()
            .map_err(|err| MirrorError::Storage(format!("credential: {err}")))?;
        let container = BlobContainerClient::new(
            account_url,
            container_name.to_string(),
            credential,
            Some(BlobContainerClientOptions::default()),
        )
        .map_err(|err| MirrorError::Storage(err.to_string()))?;
        Ok(Self { runtime, container })
    }

    /// Create the container when it does not exist yet; an existing
    /// container is fine.
    pub fn ensure_container(&self) -> Result<(), MirrorError> {
        self.runtime.block_on(async {
            match self.container.create_container(None).await {
                Ok(_) => {
                    debug!("created container");
                    Ok(())
                }
                Err(err) if err.http_status() == Some(StatusCode::Conflict) => Ok(()),
                Err(err) => Err(MirrorError::Storage(err.to_string())),
            }
        })
    }
}

impl BlobStore for AzureBlobStore {
    fn exists_with_prefix(&self, prefix: &str) -> Result<bool, MirrorError> {
        self.runtime.block_on(async {
            let mut options = BlobContainerClientListBlobFlatSegmentOptions::default();
            options.prefix = Some(prefix.to_string());
            let mut pager = self
                .container
                .list_blobs(Some(options))
                .map_err(|err| MirrorError::Storage(err.to_string()))?;

            while let Some(next) = pager.next().await {
                let response = next.map_err(|err| MirrorError::Storage(err.to_string()))?;
                let body: ListBlobsFlatSegmentResponse = response
                    .into_body()
                    .await
                    .map_err(|err| MirrorError::Storage(err.to_string()))?;
                if !body.segment.blob_items.is_empty() {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    fn put_file(&self, key: &str, source: &Path) -> Result<(), MirrorError> {
        let content = fs::read(source)
            .map_err(|err| MirrorError::Filesystem(format!("read {}: {err}", source.display())))?;
        let body = Bytes::from(content);
        self.runtime.block_on(async {
            let blob = self.container.blob_client(key.to_string());
            let content_length = body.len() as u64;
            let data: RequestContent<Bytes, NoFormat> = Body::from(body).into();
            blob.upload(
                data,
                false,
                content_length,
                Some(BlockBlobClientUploadOptions::default()),
            )
            .await
            .map_err(|err| MirrorError::Storage(format!("upload {key}: {err}")))?;
            Ok(())
        })
    }
}

/// Connection parameters for [`AzureBlobStore`]; cheap to share with every
/// worker.
pub struct AzureStoreFactory {
    account_url: String,
    container: String,
}

impl AzureStoreFactory {
    pub fn new(account_url: String, container: String) -> Self {
        Self {
            account_url,
            container,
        }
    }
}

impl StoreFactory for AzureStoreFactory {
    fn connect(&self) -> Result<Box<dyn BlobStore>, MirrorError> {
        let store = AzureBlobStore::connect(&self.account_url, &self.container)?;
        store.ensure_container()?;
        Ok(Box::new(store))
    }
}
