//! Repository module for database CRUD operations
//!
//! One repository per aggregate, each holding a cloned `PgPool`.

pub mod activity;
pub mod analytics;
pub mod attachment;
pub mod import;
pub mod inventory;
pub mod request;
pub mod user;
pub mod workflow;

pub use activity::{ActivityRepository, PurgeSummary};
pub use analytics::{AnalyticsRepository, BreakdownDimension, DEFAULT_TOP_MATERIALS};
pub use attachment::{AttachmentRepository, StoredFile};
pub use import::{ImportRepository, IMPORT_HISTORY_LIMIT};
pub use inventory::InventoryRepository;
pub use request::RequestRepository;
pub use user::UserRepository;
pub use workflow::WorkflowRepository;
