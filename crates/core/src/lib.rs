#![deny(warnings)]

pub mod animation;
pub mod audio;
pub mod avatar;
pub mod config;
pub mod util;
pub mod viseme;
