//! One-time bucket bootstrap.
//!
//! The bucket is checked, and created if missing, at most once per
//! process. Concurrent callers wait on the same check. The guard does not
//! span processes: several instances starting together may each try to
//! create the bucket, which S3 tolerates for a bucket the caller owns.

use tokio::sync::OnceCell;
use tracing::info;

use s3_ingest_core::store::ObjectStore;
use s3_ingest_core::Result;

static PROCESS_GUARD: BucketGuard = BucketGuard::new();

/// Runs the check-then-create sequence once per guard.
pub struct BucketGuard {
    ready: OnceCell<()>,
}

impl BucketGuard {
    pub const fn new() -> Self {
        Self {
            ready: OnceCell::const_new(),
        }
    }

    /// Ensure the store's bucket exists.
    ///
    /// The first successful call does the work; later calls return
    /// immediately. A failed attempt leaves the guard unset.
    pub async fn ensure(&self, store: &dyn ObjectStore) -> Result<()> {
        self.ready
            .get_or_try_init(|| async { check_and_create(store).await })
            .await
            .map(|_| ())
    }

    /// Whether the bucket has been confirmed through this guard.
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }
}

impl Default for BucketGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Ensure the bucket exists, using the process-wide guard.
///
/// Called by every CLI command before it touches storage. Concurrent callers
/// wait on the same attempt instead of racing to create the bucket.
///
/// # Arguments
///
/// - `store`: the object store whose bucket is checked and, if absent, created.
///
/// # Returns
///
/// `Ok(())` once the bucket is known to exist. The store's error if the
/// existence check or the creation fails; the next call then retries.
pub async fn ensure_bucket(store: &dyn ObjectStore) -> Result<()> {
    PROCESS_GUARD.ensure(store).await
}

async fn check_and_create(store: &dyn ObjectStore) -> Result<()> {
    if store.bucket_exists().await? {
        info!("bucket already exists");
        return Ok(());
    }

    info!("bucket not found, creating it");
    store.create_bucket().await?;
    info!("bucket created");
    Ok(())
}
