pub mod booking;
pub mod slot_lock;
pub mod transaction;

pub use booking::BookingService;
pub use slot_lock::{slot_lock_key, LockAcquisition, SlotLockService};
pub use transaction::run_booking_transaction;
