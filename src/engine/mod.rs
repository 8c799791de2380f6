pub mod columnar;
pub mod tasks;
pub mod transform;
