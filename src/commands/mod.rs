//! Command implementations for Updraft CLI

pub mod helpers;
pub mod inspect;
pub mod install;
pub mod pack;
pub mod recover;
pub mod version;
