pub mod collection;
pub mod item;
