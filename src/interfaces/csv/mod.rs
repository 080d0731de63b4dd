pub mod command_reader;
pub mod seat_writer;
