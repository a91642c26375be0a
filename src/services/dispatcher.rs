use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::cache::{CacheKey, TtlCache};
use super::postgres::PostgresError;
use super::reporter::ErrorReporter;
use super::repository::{CourierSource, OrderSource, RepositoryError};
use crate::core::{AssignmentEngine, AssignmentError, AssignmentReport, DistanceMetric, Haversine};
use crate::models::{Courier, CourierFilter, FailurePolicy};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database connection failed: {0}")]
    Connection(#[from] PostgresError),

    #[error("Failed to fetch records: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Run aborted: {0}")]
    Aborted(AssignmentError),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Config(_) => "config",
            DispatchError::Connection(_) => "connection",
            DispatchError::Repository(_) => "repository",
            DispatchError::Aborted(_) => "aborted",
        }
    }
}

/// Where the courier snapshot for a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierOrigin {
    Cache,
    Store,
}

/// Output of one run
#[derive(Debug, Clone)]
pub struct DispatchRun {
    pub report: AssignmentReport,
    pub total_orders: usize,
    pub courier_count: usize,
    pub courier_origin: CourierOrigin,
}

/// Runs one assignment batch: couriers (cache first), orders, then matching
pub struct Dispatcher<M = Haversine> {
    couriers: Arc<dyn CourierSource>,
    orders: Arc<dyn OrderSource>,
    cache: Option<TtlCache>,
    engine: AssignmentEngine<M>,
    reporter: ErrorReporter,
}

impl<M: DistanceMetric> Dispatcher<M> {
    /// Create a dispatcher; without a cache, couriers are always read from the
    /// store with the eligibility filter pushed down
    pub fn new(
        couriers: Arc<dyn CourierSource>,
        orders: Arc<dyn OrderSource>,
        cache: Option<TtlCache>,
        engine: AssignmentEngine<M>,
    ) -> Self {
        let reporter = ErrorReporter::new(engine.config().failure_policy);
        Self {
            couriers,
            orders,
            cache,
            engine,
            reporter,
        }
    }

    /// Load the courier snapshot for this run
    ///
    /// The cache holds the unfiltered courier set so a change of eligibility
    /// policy does not require invalidating it.
    pub async fn load_couriers(&self) -> Result<(Vec<Courier>, CourierOrigin), DispatchError> {
        let Some(cache) = &self.cache else {
            let filter = CourierFilter::Eligible(self.engine.config().eligibility);
            let mut couriers = self.couriers.fetch_all(filter).await?;

            // An empty filtered set hides whether the fleet itself is empty;
            // hand the engine the full fleet so it tells the two apart
            if couriers.is_empty() {
                debug!("No eligible couriers in store, loading full fleet");
                couriers = self.couriers.fetch_all(CourierFilter::All).await?;
            }
            return Ok((couriers, CourierOrigin::Store));
        };

        if let Some(couriers) = cache.get::<Vec<Courier>>(CacheKey::couriers()).await {
            return Ok((couriers, CourierOrigin::Cache));
        }

        let couriers = self.couriers.fetch_all(CourierFilter::All).await?;

        match cache.put(CacheKey::couriers(), &couriers).await {
            Ok(true) => debug!("Cached {} couriers", couriers.len()),
            Ok(false) => debug!("Courier cache entry still fresh, not rewritten"),
            Err(e) => warn!("Failed to cache couriers: {}", e),
        }

        Ok((couriers, CourierOrigin::Store))
    }

    /// Execute one batch
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<DispatchRun, DispatchError> {
        let (couriers, courier_origin) = self.load_couriers().await?;
        let orders = self.orders.fetch_all().await?;

        info!(
            couriers = couriers.len(),
            orders = orders.len(),
            origin = ?courier_origin,
            "Assigning orders"
        );

        let report = self.engine.assign_all(&couriers, &orders);
        for err in report.failures() {
            self.reporter.report_item(err);
        }

        info!(
            assigned = report.assignments().count(),
            failed = report.failures().count(),
            halted = report.halted,
            "Assignment run finished"
        );

        Ok(DispatchRun {
            report,
            total_orders: orders.len(),
            courier_count: couriers.len(),
            courier_origin,
        })
    }

    /// Under the abort policy, turn the first order failure into a fatal error
    pub fn strict_failure(&self, run: &DispatchRun) -> Option<DispatchError> {
        if self.engine.config().failure_policy != FailurePolicy::Abort {
            return None;
        }
        run.report
            .first_failure()
            .cloned()
            .map(DispatchError::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineConfig;
    use crate::models::{EligibilityPolicy, Order};
    use crate::services::cache::FileCache;
    use crate::services::clock::ManualClock;
    use crate::services::repository::{MockCourierSource, MockOrderSource};
    use std::time::Duration;

    fn courier(id: i64, lon: f64, busy: bool) -> Courier {
        Courier {
            id,
            latitude: 0.0,
            longitude: lon,
            has_active_package: busy,
        }
    }

    fn orders() -> Vec<Order> {
        vec![
            Order {
                id: 1,
                latitude: 0.0,
                longitude: 0.4,
                package_type: "document".to_string(),
            },
            Order {
                id: 2,
                latitude: 95.0,
                longitude: 0.0,
                package_type: "parcel".to_string(),
            },
        ]
    }

    fn order_source() -> MockOrderSource {
        let mut source = MockOrderSource::new();
        source.expect_fetch_all().returning(|| Ok(orders()));
        source
    }

    fn file_cache(dir: &std::path::Path) -> TtlCache {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        TtlCache::new(
            Arc::new(FileCache::new(dir, clock)),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_cache_miss_reads_store_and_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(dir.path());

        let mut couriers = MockCourierSource::new();
        couriers
            .expect_fetch_all()
            .withf(|filter| *filter == CourierFilter::All)
            .times(1)
            .returning(|_| Ok(vec![courier(1, 0.0, false), courier(2, 1.0, false)]));

        let dispatcher = Dispatcher::new(
            Arc::new(couriers),
            Arc::new(order_source()),
            Some(cache.clone()),
            AssignmentEngine::with_defaults(),
        );

        let run = dispatcher.run().await.unwrap();
        assert_eq!(run.courier_origin, CourierOrigin::Store);
        assert_eq!(run.total_orders, 2);
        assert_eq!(run.report.assignments().next().map(|a| a.courier_id), Some(1));

        let cached: Vec<Courier> = cache.get(CacheKey::couriers()).await.unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(dir.path());
        cache
            .put(CacheKey::couriers(), &vec![courier(9, 0.5, false)])
            .await
            .unwrap();

        let mut couriers = MockCourierSource::new();
        couriers.expect_fetch_all().times(0);

        let dispatcher = Dispatcher::new(
            Arc::new(couriers),
            Arc::new(order_source()),
            Some(cache),
            AssignmentEngine::with_defaults(),
        );

        let run = dispatcher.run().await.unwrap();
        assert_eq!(run.courier_origin, CourierOrigin::Cache);
        assert_eq!(run.report.assignments().next().map(|a| a.courier_id), Some(9));
    }

    #[tokio::test]
    async fn test_without_cache_pushes_filter_down() {
        let mut couriers = MockCourierSource::new();
        couriers
            .expect_fetch_all()
            .withf(|filter| *filter == CourierFilter::Eligible(EligibilityPolicy::Free))
            .times(1)
            .returning(|_| Ok(vec![courier(3, 0.0, false)]));

        let dispatcher = Dispatcher::new(
            Arc::new(couriers),
            Arc::new(order_source()),
            None,
            AssignmentEngine::with_defaults(),
        );

        let run = dispatcher.run().await.unwrap();
        assert_eq!(run.courier_count, 1);
        assert!(dispatcher.strict_failure(&run).is_none());
    }

    #[tokio::test]
    async fn test_without_cache_all_busy_is_no_eligible_courier() {
        let mut couriers = MockCourierSource::new();
        couriers
            .expect_fetch_all()
            .withf(|filter| *filter == CourierFilter::Eligible(EligibilityPolicy::Free))
            .times(1)
            .returning(|_| Ok(Vec::new()));
        couriers
            .expect_fetch_all()
            .withf(|filter| *filter == CourierFilter::All)
            .times(1)
            .returning(|_| Ok(vec![courier(1, 0.0, true)]));

        let dispatcher = Dispatcher::new(
            Arc::new(couriers),
            Arc::new(order_source()),
            None,
            AssignmentEngine::with_defaults(),
        );

        let run = dispatcher.run().await.unwrap();
        assert_eq!(
            run.report.outcomes[0],
            Err(AssignmentError::NoEligibleCourier { order_id: 1 })
        );
    }

    #[tokio::test]
    async fn test_without_cache_empty_fleet_is_no_couriers() {
        let mut couriers = MockCourierSource::new();
        couriers.expect_fetch_all().times(2).returning(|_| Ok(Vec::new()));

        let dispatcher = Dispatcher::new(
            Arc::new(couriers),
            Arc::new(order_source()),
            None,
            AssignmentEngine::with_defaults(),
        );

        let run = dispatcher.run().await.unwrap();
        assert_eq!(
            run.report.outcomes[0],
            Err(AssignmentError::NoCouriersAvailable { order_id: 1 })
        );
    }

    #[tokio::test]
    async fn test_repository_error_is_fatal() {
        let mut couriers = MockCourierSource::new();
        couriers.expect_fetch_all().returning(|_| {
            Err(RepositoryError::InvalidRow {
                table: "couriers",
                reason: "duplicate id 1".to_string(),
            })
        });
        let mut orders = MockOrderSource::new();
        orders.expect_fetch_all().times(0);

        let dispatcher = Dispatcher::new(
            Arc::new(couriers),
            Arc::new(orders),
            None,
            AssignmentEngine::with_defaults(),
        );

        let err = dispatcher.run().await.unwrap_err();
        assert_eq!(err.kind(), "repository");
    }

    #[tokio::test]
    async fn test_abort_policy_yields_fatal_error() {
        let mut couriers = MockCourierSource::new();
        couriers
            .expect_fetch_all()
            .returning(|_| Ok(vec![courier(1, 0.0, false)]));

        let engine = AssignmentEngine::new(
            Haversine::default(),
            EngineConfig {
                failure_policy: FailurePolicy::Abort,
                ..EngineConfig::default()
            },
        );
        let dispatcher = Dispatcher::new(Arc::new(couriers), Arc::new(order_source()), None, engine);

        let run = dispatcher.run().await.unwrap();
        assert_eq!(run.report.outcomes.len(), 2);

        let err = dispatcher.strict_failure(&run).unwrap();
        assert!(matches!(
            err,
            DispatchError::Aborted(AssignmentError::InvalidCoordinate { order_id: 2, .. })
        ));
    }
}
