pub mod affiliate;
pub mod attribution;
pub mod payout;
#[cfg(test)]
pub mod test_utils;
pub mod tier;
pub mod user;

pub use affiliate::Affiliate;
pub use attribution::Attribution;
pub use payout::Payout;
pub use user::User;
