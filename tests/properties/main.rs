//! Property tests for version handling and asset selection.

mod selection_tests;
mod version_tests;
