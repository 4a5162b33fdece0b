mod build_tests;
mod common;
mod reference_tests;
mod store_tests;
