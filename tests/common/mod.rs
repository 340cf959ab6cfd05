#[cfg(feature = "integration-tests")]
pub mod offscreen;
pub mod test_utils;
