#![allow(dead_code, unused_imports)]

pub use skillwatch_test_utils::builders;
pub use skillwatch_test_utils::fakes;
pub use skillwatch_test_utils::{init_tracing, with_timeout};
