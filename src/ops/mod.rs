pub mod blur;
pub mod color;
pub mod compositor;
pub mod tone_curve;
pub mod transform;
