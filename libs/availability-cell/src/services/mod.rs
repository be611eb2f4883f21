pub mod resolver;
pub mod schedule;

pub use resolver::{booking_window, resolve_slots, ScheduleError, SLOT_MINUTES};
pub use schedule::AvailabilityService;
