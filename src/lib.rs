// Library exports for tnseval
pub mod batch;
pub mod classify;
pub mod evaluate;
pub mod fasta;
pub mod mapping;
pub mod paf;
pub mod reference;
pub mod report;
pub mod tally;
