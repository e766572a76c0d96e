pub mod charset;
pub mod xml_reader;
