pub mod clock;
pub mod reconcile;
pub mod reschedule;
pub mod status;
