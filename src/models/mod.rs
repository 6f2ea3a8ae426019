pub mod action;
pub mod document;
pub mod error_record;
pub mod ledger_row;
pub mod summary;

pub use action::{ActionId, Handler, ScheduledAction};
pub use document::DocumentRef;
pub use error_record::{ErrorRecord, TriageStatus};
pub use ledger_row::{DeliveryStatus, LedgerRow, NewRow};
pub use summary::SummaryFields;
