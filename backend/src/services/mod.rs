//! Business logic services for the AgroTIC platform

pub mod activity;
pub mod auth;
pub mod crop;
pub mod dashboard;
pub mod harvest;
pub mod inventory;
pub mod notification;
pub mod reporting;
pub mod sale;
pub mod sensor;
pub mod user;
pub mod zone;

pub use activity::ActivityService;
pub use auth::AuthService;
pub use crop::CropService;
pub use dashboard::DashboardService;
pub use harvest::HarvestService;
pub use inventory::InventoryService;
pub use notification::{NotificationHub, NotificationService};
pub use reporting::ReportingService;
pub use sale::SaleService;
pub use sensor::SensorService;
pub use user::UserService;
pub use zone::ZoneService;
