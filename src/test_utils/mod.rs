//! the test_utils folder here will share utils or test components between unit
//! tests and integrations tests
mod common;
mod fake_backend;

pub use common::*;
pub use fake_backend::*;
