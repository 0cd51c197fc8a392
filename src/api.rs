pub mod attendance;
pub mod dashboard;
pub mod employee;
pub mod holiday;
pub mod leave;
pub mod notification;
pub mod project;
pub mod settings;
pub mod work_log;
