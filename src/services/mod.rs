pub mod accounts;
pub mod catalog;
pub mod providers;
pub mod ratings;
pub mod recommendations;
