
mod list;
mod sweep;
mod upload;
