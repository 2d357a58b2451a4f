pub mod actions;
pub mod builder;
pub mod chat;
pub mod enums;
pub mod params;
pub mod simplified;
pub mod state;
pub mod wire;
