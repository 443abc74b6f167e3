pub mod connections;
pub mod costs;
pub mod events;
pub mod users;
pub mod waste;

pub use connections::ConnectionRepo;
pub use costs::CostRecordRepo;
pub use events::CostEventRepo;
pub use users::UserRepo;
pub use waste::WasteFindingRepo;
