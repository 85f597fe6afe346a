#![allow(clippy::result_large_err)]

pub mod document;
pub mod error;
pub mod storage;
pub mod utils;
