pub mod geometry;
pub mod leads;
pub mod settings;
