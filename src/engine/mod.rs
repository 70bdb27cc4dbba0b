pub mod assignment;
pub mod reconcile;
pub mod selection;
pub mod transition;
