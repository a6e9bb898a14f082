pub mod clock;
pub mod config;
pub mod observability;
pub mod store;
pub mod backend;
pub mod accumulator;
pub mod scheduler;

pub use accumulator::{AggregationOp, Flusher, MetricValue, Recorder};
pub use backend::{HttpBackend, InMemoryBackend, MetricBackend};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::ShimConfig;
pub use scheduler::FlushScheduler;
pub use store::{InMemoryStore, KvStore, RedisStore};
