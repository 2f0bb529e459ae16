pub mod local;
pub mod object_store;
pub mod s3;
