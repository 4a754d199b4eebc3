pub mod file;
pub mod licenses;
pub mod model;
pub mod settings;

pub use file::Store;
pub use model::{Dataset, Flag, KeyStatus, KeyType, LicenseRecord, Settings};
