pub mod actor;
pub mod assignment;
pub mod event;
pub mod order;
pub mod partner;
pub mod status;
