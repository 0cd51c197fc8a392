pub mod attendance;
pub mod employee;
pub mod holiday;
pub mod leave;
pub mod notification;
pub mod project;
pub mod role;
pub mod user;
pub mod user_settings;
pub mod work_log;
