pub mod booking;
pub mod multi_player;
pub mod partner;
pub mod schedule;
pub mod user;
pub mod withdrawal;

pub use booking::{
    Booking, BookingAction, BookingStatus, PaymentInfo, RefundRecord, ScheduledBooking,
    ServiceType,
};
pub use multi_player::{MultiPlayerBooking, MultiPlayerStatus};
pub use partner::{Partner, PartnerStatus};
pub use schedule::{Schedule, ScheduleInput};
pub use user::{Customer, Role, User, Violation};
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus};

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
