pub mod clock;
pub mod config;
pub mod error;
pub mod limits;
pub mod metrics;
pub mod server;
pub mod store;
pub mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LimitManagerConfig, LimitsConfig, Thresholds};
pub use error::{ClockError, LimitError, StoreError, SubscriptionError};
pub use limits::{Admission, Limit, LimitManager};
pub use store::{FirestoreStore, InMemoryStore, TimestampFilter, TimestampRecord, TimestampStore};
pub use subscription::{StaticSubscriptions, SubscriptionSource};
