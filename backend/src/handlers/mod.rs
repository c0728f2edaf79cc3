//! HTTP request handlers

pub mod activity;
pub mod auth;
pub mod crop;
pub mod dashboard;
pub mod harvest;
pub mod health;
pub mod inventory;
pub mod notification;
pub mod sale;
pub mod sensor;
pub mod user;
pub mod ws;
pub mod zone;

pub use activity::*;
pub use auth::*;
pub use crop::*;
pub use dashboard::*;
pub use harvest::*;
pub use health::*;
pub use inventory::*;
pub use notification::*;
pub use sale::*;
pub use sensor::*;
pub use user::*;
pub use ws::*;
pub use zone::*;
