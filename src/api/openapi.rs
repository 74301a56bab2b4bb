//! OpenAPI document and Swagger UI wiring.
//!
//! Add new endpoints to `paths(...)` so they are both served and
//! documented; the UI is mounted at `/docs`.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{health, reset_password, sites, ErrorEntity, ErrorResponse};
use crate::sites::Site;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        sites::current_site,
        sites::filter_sites,
        sites::switch_site,
        reset_password::reset_password,
    ),
    components(schemas(
        Site,
        health::Health,
        sites::CurrentSiteResponse,
        sites::FilteredSitesResponse,
        sites::SwitchSiteResponse,
        reset_password::ResetPasswordForm,
        reset_password::ResetPasswordResponse,
        ErrorEntity,
        ErrorResponse,
    )),
    tags(
        (name = "site", description = "Site listing and selection"),
        (name = "authentication", description = "Password reset validation"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
