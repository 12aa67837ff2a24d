//! End-to-end tests across the build and query pipeline.
