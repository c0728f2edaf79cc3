//! Domain models for the AgroTIC platform

mod activity;
mod crop;
mod dashboard;
mod harvest;
mod inventory;
mod notification;
mod report;
mod sensor;
mod user;
mod zone;

pub use activity::*;
pub use crop::*;
pub use dashboard::*;
pub use harvest::*;
pub use inventory::*;
pub use notification::*;
pub use report::*;
pub use sensor::*;
pub use user::*;
pub use zone::*;
