pub mod catalog;
pub mod character;
pub mod item;
pub mod location;
pub mod value;
