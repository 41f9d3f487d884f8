pub mod alignment_group;
pub mod per_read_reducer;
pub mod read_aligner;
