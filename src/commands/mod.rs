pub mod account;
pub mod calendar;
pub mod pull;
pub mod status;
