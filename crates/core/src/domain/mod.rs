pub mod event;
pub mod feedback;
pub mod intent;
pub mod team;
pub mod records;
