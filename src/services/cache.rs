use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use super::clock::Clock;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Byte-level cache storage
///
/// `put` only stores the payload when the previous write for `key` is older
/// than `lifetime`; it reports whether it wrote.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn put(&self, key: &str, payload: &[u8], lifetime: Duration) -> Result<bool, CacheError>;
}

/// One JSON file per key, named by the SHA-256 of the key
///
/// The file's modified time is the entry's last-write time. The freshness
/// check and the write are not atomic across processes, so two concurrent
/// runs may both refresh the entry.
pub struct FileCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn last_write(&self, path: &Path) -> Result<Option<SystemTime>, CacheError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, payload: &[u8], lifetime: Duration) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        let now: SystemTime = self.clock.now().into();

        if let Some(written) = self.last_write(&path).await? {
            // A write stamped in the future counts as fresh
            let age = now.duration_since(written).unwrap_or_default();
            if age <= lifetime {
                tracing::trace!("Cache entry still fresh ({}s old): {}", age.as_secs(), key);
                return Ok(false);
            }
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        // Write beside the target then rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;
        file.into_std().await.set_modified(now)?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!("Cache file written: {}", path.display());
        Ok(true)
    }
}

/// Redis-backed cache storage
///
/// The payload never expires on its own. A companion `<key>:written` marker is
/// claimed with `SET NX EX`, so only one writer per lifetime window refreshes
/// the payload. If the payload write fails the marker is deleted again so the
/// next run can retry; a marker left behind by a lost connection expires with
/// the window. Expiry follows the Redis server's clock.
pub struct RedisCache {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
        })
    }

    fn marker_key(key: &str) -> String {
        format!("{}:written", key)
    }

    /// Give up the refresh claim on `key`
    async fn release_claim(conn: &mut ConnectionManager, key: &str) -> Result<(), CacheError> {
        redis::cmd("DEL")
            .arg(Self::marker_key(key))
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.redis.lock().await;
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, payload: &[u8], lifetime: Duration) -> Result<bool, CacheError> {
        let mut conn = self.redis.lock().await;

        let claimed: Option<String> = redis::cmd("SET")
            .arg(Self::marker_key(key))
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("NX")
            .arg("EX")
            .arg(lifetime.as_secs().max(1))
            .query_async(&mut *conn)
            .await?;

        if claimed.is_none() {
            tracing::trace!("Cache entry still fresh: {}", key);
            return Ok(false);
        }

        let written = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .query_async::<()>(&mut *conn)
            .await;

        if let Err(e) = written {
            if let Err(release) = Self::release_claim(&mut conn, key).await {
                tracing::warn!("Failed to release cache claim for {}: {}", key, release);
            }
            return Err(e.into());
        }

        tracing::trace!("Cache set: {}", key);
        Ok(true)
    }
}

/// JSON value cache with a refresh-at-most-once-per-lifetime policy
///
/// Reads never check expiry: a stale entry keeps being served until a later
/// `put` refreshes it. Backend failures on read degrade to a miss.
#[derive(Clone)]
pub struct TtlCache {
    backend: Arc<dyn KeyValueCache>,
    lifetime: Duration,
}

impl TtlCache {
    pub fn new(backend: Arc<dyn KeyValueCache>, lifetime: Duration) -> Self {
        Self { backend, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Get a value from cache, treating any failure as a miss
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!("Cache miss: {}", key);
                return None;
            }
            Err(e) => {
                tracing::warn!("Cache read failed for {}, treating as miss: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                tracing::debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Corrupt cache entry for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Store a value unless the entry was written within the lifetime
    pub async fn put<T>(&self, key: &str, value: &T) -> Result<bool, CacheError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_vec(value)?;
        self.backend.put(key, &json, self.lifetime).await
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build the cache key for the courier snapshot
    pub fn couriers() -> &'static str {
        "couriers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Courier;
    use crate::services::clock::ManualClock;
    use chrono::DateTime;

    const HOUR: Duration = Duration::from_secs(3600);

    fn couriers() -> Vec<Courier> {
        vec![
            Courier {
                id: 1,
                latitude: 41.0082,
                longitude: 28.9784,
                has_active_package: false,
            },
            Courier {
                id: 2,
                latitude: -33.8688,
                longitude: 151.2093,
                has_active_package: true,
            },
        ]
    }

    fn file_cache(dir: &Path) -> (TtlCache, Arc<ManualClock>) {
        // Start near wall-clock time so file systems accept the mtime
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let backend = FileCache::new(dir, clock.clone());
        (TtlCache::new(Arc::new(backend), HOUR), clock)
    }

    #[tokio::test]
    async fn test_round_trip_within_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _clock) = file_cache(dir.path());

        assert!(cache.put(CacheKey::couriers(), &couriers()).await.unwrap());
        let cached: Vec<Courier> = cache.get(CacheKey::couriers()).await.unwrap();
        assert_eq!(cached, couriers());
    }

    #[tokio::test]
    async fn test_put_within_lifetime_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, clock) = file_cache(dir.path());

        cache.put("couriers", &couriers()).await.unwrap();
        clock.advance(Duration::from_secs(3599));

        let written = cache.put("couriers", &Vec::<Courier>::new()).await.unwrap();
        assert!(!written);
        let cached: Vec<Courier> = cache.get("couriers").await.unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_put_after_lifetime_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, clock) = file_cache(dir.path());

        cache.put("couriers", &couriers()).await.unwrap();
        clock.advance(Duration::from_secs(3601));

        // Stale entries are still served until refreshed
        let stale: Vec<Courier> = cache.get("couriers").await.unwrap();
        assert_eq!(stale.len(), 2);

        let refreshed = vec![couriers().remove(0)];
        assert!(cache.put("couriers", &refreshed).await.unwrap());
        let cached: Vec<Courier> = cache.get("couriers").await.unwrap();
        assert_eq!(cached, refreshed);
    }

    #[tokio::test]
    async fn test_future_write_counts_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, clock) = file_cache(dir.path());

        let now = clock.now();
        clock.set(now + chrono::Duration::hours(2));
        cache.put("couriers", &couriers()).await.unwrap();
        clock.set(now);

        assert!(!cache.put("couriers", &Vec::<Courier>::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _clock) = file_cache(dir.path());

        assert!(cache.get::<Vec<Courier>>("couriers").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_dir_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let (cache, _clock) = file_cache(&blocker);

        assert!(cache.get::<Vec<Courier>>("couriers").await.is_none());
        assert!(cache.put("couriers", &couriers()).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let backend = FileCache::new(dir.path(), clock);
        std::fs::write(backend.entry_path("couriers"), b"{not json").unwrap();
        let cache = TtlCache::new(Arc::new(backend), HOUR);

        assert!(cache.get::<Vec<Courier>>("couriers").await.is_none());
    }

    #[test]
    fn test_entry_path_is_hashed() {
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(0, 0).unwrap()));
        let backend = FileCache::new("/tmp/cache", clock);

        let path = backend.entry_path("couriers/../../etc");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".json".len());
        assert!(name.ends_with(".json"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/cache")));
        assert_ne!(backend.entry_path("a"), backend.entry_path("b"));
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_redis_refresh_window() {
        let cache = RedisCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to create cache");
        let key = "courier-algo:test:couriers";

        assert!(cache.put(key, b"[1]", Duration::from_secs(60)).await.unwrap());
        assert!(!cache.put(key, b"[2]", Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get(key).await.unwrap(), Some(b"[1]".to_vec()));
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_redis_released_claim_allows_refresh() {
        let cache = RedisCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to create cache");
        let key = "courier-algo:test:released";
        {
            let mut conn = cache.redis.lock().await;
            RedisCache::release_claim(&mut conn, key).await.unwrap();
        }

        assert!(cache.put(key, b"[1]", Duration::from_secs(60)).await.unwrap());
        {
            let mut conn = cache.redis.lock().await;
            RedisCache::release_claim(&mut conn, key).await.unwrap();
        }
        assert!(cache.put(key, b"[2]", Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get(key).await.unwrap(), Some(b"[2]".to_vec()));
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::couriers(), "couriers");
    }
}
