pub mod agents;
pub mod meetings;
pub mod webhook;
