//! Constants used throughout the Carebook core crate.

/// Page size applied when a list request does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound on the page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// How long a transaction waits for another process to release the database file.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Entity names used in `NotFound` errors and log fields.
pub const APPOINTMENT: &str = "appointment";
pub const CONSULTATION: &str = "consultation";
pub const PAYMENT: &str = "payment";
pub const REVIEW: &str = "review";
pub const AVAILABILITY: &str = "availability";
pub const DOCTOR: &str = "doctor";
pub const HOME_CARE_PROVIDER: &str = "home care provider";
pub const HOME_CARE_VISIT: &str = "home care visit";
pub const NOTIFICATION: &str = "notification";
pub const CHAT_MESSAGE: &str = "chat message";
