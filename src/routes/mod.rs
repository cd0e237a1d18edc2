pub mod destinations;
pub mod health;
pub mod webhook;
