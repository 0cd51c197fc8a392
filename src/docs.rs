use crate::api::attendance::{
    AttendanceView, CheckInReq, CheckOutReq, CreateAttendance, UpdateAttendance,
};
use crate::api::dashboard::DashboardStats;
use crate::api::employee::{CreateEmployee, EmergencyContact, EmployeeListResponse};
use crate::api::holiday::{HolidayOccurrence, HolidayReq};
use crate::api::leave::{CreateLeave, LeaveListResponse, LeaveResponse, UpdateLeave};
use crate::api::notification::{CreateNotification, UpdateNotification};
use crate::api::project::{CreateProject, ProjectFileView, UpdateProject};
use crate::api::work_log::{CreateWorkLog, UpdateWorkLog, WorkLogSummary};
use crate::model::attendance::{AttendanceStatus, WorkLocation};
use crate::model::employee::{Employee, EmployeeStatus};
use crate::model::notification::Notification;
use crate::model::project::{Project, ProjectCategory, ProjectTag};
use crate::model::user_settings::UserSettings;
use crate::model::work_log::{Priority, WorkStatus};
use crate::models::{
    ChangePasswordReq, ForgotPasswordReq, LoginReqDto, ResetPasswordReq, SignUpReq, TokenPair,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Portal API",
        version = "1.0.0",
        description = r#"
## HR Portal

Back office for a small company's people operations. Every record belongs to
the signed-in account and is never visible to other accounts.

### 🔹 Key Features
- **Employees**: profiles with emergency contacts, skills and status
- **Attendance**: daily check-in and check-out, office or home
- **Leave**: requests with approval by HR or Admin
- **Holidays**: one-off and yearly recurring days off
- **Work logs**: task hours with daily totals
- **Notifications** and per-account **settings**
- **Projects**: assignments with file attachments
- **Dashboard**: the day at a glance

### 🔐 Security
Everything under `/api` requires a **JWT Bearer** access token obtained from `/auth/login`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::signup,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::change_password,
        crate::auth::handlers::account,

        crate::api::dashboard::get_dashboard,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::create_record,
        crate::api::attendance::update_record,
        crate::api::attendance::delete_record,
        crate::api::attendance::get_record,
        crate::api::attendance::list_attendance,

        crate::api::leave::leave_list,
        crate::api::leave::get_leave,
        crate::api::leave::create_leave,
        crate::api::leave::update_leave,
        crate::api::leave::delete_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,

        crate::api::holiday::list_holidays,
        crate::api::holiday::get_holiday,
        crate::api::holiday::create_holiday,
        crate::api::holiday::update_holiday,
        crate::api::holiday::delete_holiday,

        crate::api::work_log::list_work_logs,
        crate::api::work_log::get_work_log,
        crate::api::work_log::create_work_log,
        crate::api::work_log::update_work_log,
        crate::api::work_log::delete_work_log,

        crate::api::notification::list_notifications,
        crate::api::notification::get_notification,
        crate::api::notification::create_notification,
        crate::api::notification::update_notification,
        crate::api::notification::toggle_notification,
        crate::api::notification::delete_notification,

        crate::api::settings::get_settings,
        crate::api::settings::update_settings,

        crate::api::project::list_projects,
        crate::api::project::get_project,
        crate::api::project::create_project,
        crate::api::project::update_project,
        crate::api::project::delete_project,
        crate::api::project::list_files,
        crate::api::project::upload_file,
        crate::api::project::download_file,
        crate::api::project::delete_file
    ),
    components(
        schemas(
            SignUpReq,
            LoginReqDto,
            ForgotPasswordReq,
            ResetPasswordReq,
            ChangePasswordReq,
            TokenPair,
            DashboardStats,
            Employee,
            EmployeeStatus,
            EmergencyContact,
            CreateEmployee,
            EmployeeListResponse,
            AttendanceView,
            AttendanceStatus,
            WorkLocation,
            CheckInReq,
            CheckOutReq,
            CreateAttendance,
            UpdateAttendance,
            CreateLeave,
            UpdateLeave,
            LeaveResponse,
            LeaveListResponse,
            HolidayReq,
            HolidayOccurrence,
            CreateWorkLog,
            UpdateWorkLog,
            WorkLogSummary,
            Priority,
            WorkStatus,
            Notification,
            CreateNotification,
            UpdateNotification,
            UserSettings,
            Project,
            ProjectCategory,
            ProjectTag,
            ProjectFileView,
            CreateProject,
            UpdateProject
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign up, sign in and password management"),
        (name = "Dashboard", description = "Daily overview"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Holiday", description = "Holiday calendar APIs"),
        (name = "WorkLog", description = "Work log APIs"),
        (name = "Notification", description = "Notification APIs"),
        (name = "Settings", description = "Account settings APIs"),
        (name = "Project", description = "Projects and attachments"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_area() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/api/dashboard",
            "/api/holidays",
            "/api/work-logs",
            "/api/notifications/{notification_id}/toggle",
            "/api/projects/{project_id}/files/{file_id}",
            "/api/settings",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
