pub mod logical_file;
pub mod physical_object;
