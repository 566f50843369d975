pub mod catalog;
pub mod config;
pub mod error;
pub mod processing {
    pub mod compose;
    pub mod encode;
    pub mod layout;
    pub mod orientation;
    pub mod pairing;
    pub mod resize;
}
pub mod selection;
pub mod setup;
pub mod surface;
pub mod tasks {
    pub mod scheduler;
}
pub mod web;
