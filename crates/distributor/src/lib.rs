pub mod distributor;
pub mod error;
pub mod event;
pub mod slot;
pub mod source;

pub use distributor::{Distributor, DistributorBuilder};
pub use error::DistributorError;
pub use event::{DistributorEvent, EventSource};
pub use slot::WorkerSlot;
pub use source::{fn_action, fn_source, WorkSource, WorkerAction};
