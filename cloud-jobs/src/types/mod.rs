pub mod job;
pub mod storage;
