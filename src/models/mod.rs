pub mod fs_types;
pub mod predict_types;
