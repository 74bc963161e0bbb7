pub mod examiner;
pub mod gouge;
pub mod user;
pub mod vote;
