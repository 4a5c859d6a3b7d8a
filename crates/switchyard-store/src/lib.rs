pub mod store;

pub use store::SqliteTrajectoryStore;
