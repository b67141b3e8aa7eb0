pub mod health;
pub mod listing;
pub mod media;
pub mod responses;
