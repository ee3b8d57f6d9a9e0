//! Library half of the CLI: carrying out organize plans and the per-image run loop.
pub mod fs_apply;
pub mod run;
