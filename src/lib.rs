pub mod bbox;
pub mod cell;
pub mod geometry;
pub mod output;
pub mod partitioner;
pub mod plane_partitioner;
pub mod settings;
pub mod surface;
pub mod survey;
pub mod universe;
