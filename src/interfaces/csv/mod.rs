pub mod outcome_writer;
pub mod transfer_reader;
