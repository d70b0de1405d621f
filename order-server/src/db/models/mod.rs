//! Database models

pub mod analytics;
pub mod backup;
pub mod order;
pub mod report;
pub mod subscription;
pub mod user;

pub use analytics::{AnalyticsEvent, PageView};
pub use backup::{BackupManifest, CollectionResult, CollectionStatus};
pub use order::{Order, OrderItem, OrderStatus};
pub use report::{DailyReport, MonthlyAggregate};
pub use subscription::Subscription;
pub use user::{Product, User};
