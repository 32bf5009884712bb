pub mod analysis;
pub mod review;
