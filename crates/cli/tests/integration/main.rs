mod build_tests;
mod common;
mod gc_tests;
