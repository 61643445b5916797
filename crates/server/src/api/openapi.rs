//! OpenAPI/Utoipa configuration.

use crate::api::AUTH_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);
        let bearer = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .bearer_format("JWT")
            .description(Some(
                "Use the access token returned by `/api/auth/login` or `/api/auth/register`.",
            ))
            .build();
        components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Auth Token Service API",
        version = "1.0.0",
        description = "Access tokens, refresh tokens and Google login."
    ),
    tags(
        (name = AUTH_TAG, description = "Authentication endpoints")
    )
)]
pub struct ApiDoc;
