use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::files::upload_file,
        crate::handlers::files::list_files,
        crate::handlers::files::get_file,
        crate::handlers::files::download_file,
        crate::handlers::files::delete_file,
        crate::handlers::storage::remaining_storage,
        crate::handlers::storage::reconcile_storage,
    ),
    components(
        schemas(
            crate::models::RegisterRequest,
            crate::models::LoginRequest,
            crate::models::UserResponse,
            crate::models::RegisterResponse,
            crate::models::AuthResponse,
            crate::models::MeResponse,
            crate::models::FileView,
            crate::models::Pagination,
            crate::models::UploadForm,
            crate::models::UploadResponse,
            crate::models::FileResponse,
            crate::models::FileListResponse,
            crate::models::MessageResponse,
            crate::models::StorageResponse,
            crate::models::ReconcileResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "files", description = "File upload, download and management"),
        (name = "storage", description = "Storage quota"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "File Storage API",
        version = "1.0.0",
        description = "Per-user file storage with quota enforcement"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

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

pub fn create_docs_router() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
