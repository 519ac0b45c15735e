pub mod alert;
pub mod status;
