mod ledger;

pub use ledger::{BookingLedger, LedgerError};
