pub mod conversion;
pub mod writer;
