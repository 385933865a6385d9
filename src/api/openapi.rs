//! OpenAPI document assembly, served at `/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "agora",
        description = "Community platform API: members, boards, posts, comments and push subscriptions."
    ),
    paths(
        handlers::health::health,
        handlers::tokens::create,
        handlers::tokens::refresh,
        handlers::members::signup,
        handlers::members::me,
        handlers::members::list,
        handlers::members::toggle_activation,
        handlers::members::toggle_privilege,
        handlers::members::delete,
        handlers::members::change_password,
        handlers::members::request_reset,
        handlers::members::confirm_reset,
        handlers::boards::list,
        handlers::boards::create,
        handlers::boards::update,
        handlers::boards::delete,
        handlers::posts::window,
        handlers::posts::create,
        handlers::posts::get,
        handlers::posts::delete,
        handlers::comments::create,
        handlers::comments::delete,
        handlers::push::register,
        handlers::push::deregister,
        handlers::push::subscribe,
        handlers::push::unsubscribe,
        handlers::files::download,
        handlers::files::upload,
    ),
    components(schemas(
        super::error::ErrorBody,
        handlers::tokens::LoginRequest,
        handlers::tokens::AccessToken,
        handlers::members::MemberBody,
        handlers::members::SignupRequest,
        handlers::members::PasswordChangeRequest,
        handlers::members::ResetRequest,
        handlers::members::ResetConfirmRequest,
        handlers::boards::BoardBody,
        handlers::boards::BoardInput,
        handlers::posts::PostBody,
        handlers::posts::PostWindow,
        handlers::posts::PostDetail,
        handlers::posts::PostInput,
        handlers::comments::CommentBody,
        handlers::comments::CommentInput,
        handlers::push::PushTokenInput,
        handlers::push::PushTokenBody,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "tokens", description = "Login and token refresh"),
        (name = "members", description = "Member lifecycle and credentials"),
        (name = "boards", description = "Board management"),
        (name = "posts", description = "Posts and the paginated board window"),
        (name = "comments", description = "Comments under posts"),
        (name = "push", description = "Device tokens and board subscriptions"),
        (name = "files", description = "Blob upload and download"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_core_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/v1/tokens",
            "/v1/tokens/refresh",
            "/v1/members",
            "/v1/boards/{id}/posts",
            "/files/{name}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path: {path}");
        }
    }
}
