pub mod analysis;
pub mod commit;
pub mod review;
