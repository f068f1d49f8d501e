use crate::modules::auth::dto::*;
use crate::modules::jobs::dto::*;
use crate::modules::jobs::model::{FileType, JobRequest, JobState, OutputFileMetadata};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::handler::register,
        crate::modules::auth::handler::login,
        crate::modules::auth::handler::get_me,
        crate::modules::jobs::handler::submit_job,
        crate::modules::jobs::handler::get_job,
        crate::modules::jobs::handler::list_jobs,
    ),
    components(
        schemas(
            RegisterRequest, LoginRequest, AuthResponse, UserResponse,
            TranscodeRequest, TranscodeResponse, JobResponse,
            JobRequest, JobState, FileType, OutputFileMetadata,
        )
    ),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Jobs", description = "Transcoding job submission and progress")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
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
}
