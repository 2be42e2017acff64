pub mod blurring;
pub mod detection;
pub mod overlay;
pub mod session;
pub mod shared;
pub mod video;
