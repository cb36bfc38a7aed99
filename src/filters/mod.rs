//! Composable raster filters. Each takes a raster and returns a new raster
//! of identical shape.

pub mod background;
pub mod color;
pub mod contrast;
pub mod kernels;
pub mod noise;
pub mod stars;

pub use background::{remove_background, DEFAULT_BACKGROUND_SIGMA};
pub use color::color_calibrate;
pub use contrast::enhance_contrast;
pub use noise::reduce_noise;
pub use stars::{reduce_stars, DEFAULT_STAR_THRESHOLD};
