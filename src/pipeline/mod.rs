pub mod calibration;
pub mod correction;
pub mod event;
pub mod export;
pub mod extract;
pub mod normalize;
pub mod raster;
pub mod segment;
pub mod session;
