// Service exports
pub mod cache;
pub mod clock;
pub mod dispatcher;
pub mod postgres;
pub mod reporter;
pub mod repository;

pub use cache::{CacheError, CacheKey, FileCache, KeyValueCache, RedisCache, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{CourierOrigin, DispatchError, DispatchRun, Dispatcher};
pub use postgres::{PostgresClient, PostgresCourierRepository, PostgresError, PostgresOrderRepository};
pub use reporter::{ErrorReporter, USER_FACING_MESSAGE};
pub use repository::{
    CourierSource, OrderSource, RepositoryError, StaticCourierSource, StaticOrderSource,
};
