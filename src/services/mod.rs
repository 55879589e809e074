pub mod api;
pub mod batch_inspector;
pub mod fs_service;
pub mod preview;
pub mod registry;
pub mod report;
pub mod single_inspector;
