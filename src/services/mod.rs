//! Authoring services.

pub mod scaffold;

pub use scaffold::Scaffolder;
