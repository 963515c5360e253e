pub mod intent;
pub mod message;
pub mod parameters;
pub mod table;
