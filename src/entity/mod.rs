pub mod adjustment;
pub mod affiliate;
pub mod attribution;
pub mod commission_rule;
pub mod payout_request;
pub mod user;

pub use attribution::AttributionStatus;
pub use payout_request::PayoutStatus;
