//! Integration tests for the celeste-release binary

mod helpers;

mod test_init;
mod test_manifest;
mod test_notes;
mod test_plan;
mod test_run;
mod test_version;
