use crate::{
    notification::{
        notification_handlers, CreateNotificationRequest, MarkAllReadRequest, MarkReadRequest,
        Notification,
    },
    state::AppState,
};
use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification_handlers::list_notifications,
        notification_handlers::create_notification,
        notification_handlers::mark_read,
        notification_handlers::mark_all_read,
    ),
    components(
        schemas(
            Notification,
            CreateNotificationRequest,
            MarkReadRequest,
            MarkAllReadRequest,
        )
    ),
    tags(
        (name = "notifications", description = "Notification store endpoints")
    )
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let notification_routes = Router::new()
        .route(
            "/",
            get(notification_handlers::list_notifications)
                .post(notification_handlers::create_notification),
        )
        .route("/mark-read", patch(notification_handlers::mark_read))
        .route("/mark-all-read", patch(notification_handlers::mark_all_read));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/notifications", notification_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
