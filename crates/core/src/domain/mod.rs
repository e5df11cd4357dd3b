pub mod approval;
pub mod directory;
