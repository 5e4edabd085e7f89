use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Baton Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::board_stream,
        crate::routes::board::get_board,
        crate::routes::board::get_roster,
        crate::routes::board::pass_token,
        crate::routes::board::toggle_queue,
        crate::routes::board::set_status,
        crate::routes::board::toggle_indicator,
        crate::routes::board::toggle_skip,
        crate::routes::resource::get_resource,
        crate::routes::resource::acquire,
        crate::routes::resource::release,
        crate::routes::resource::request_release,
        crate::routes::resource::post_message,
        crate::routes::sync::pull,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::board::BoardView,
            crate::dto::board::QueueView,
            crate::dto::board::IndicatorsView,
            crate::dto::board::AuditView,
            crate::dto::board::TokenPassedEvent,
            crate::dto::board::RosterView,
            crate::dto::board::RosterEntry,
            crate::dto::board::SetStatusRequest,
            crate::dto::board::SyncReport,
            crate::dto::resource::ResourceView,
            crate::dto::resource::MessageView,
            crate::dto::resource::ResourcePersonRequest,
            crate::dto::resource::ReleaseRequestBody,
            crate::dto::resource::PostMessageRequest,
            crate::state::roster::Team,
            crate::state::board::Indicator,
            crate::state::resource::MessageCategory,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "board", description = "Token rotation, statuses and indicators"),
        (name = "resource", description = "Shared resource lock and message log"),
        (name = "sync", description = "Synchronization with the remote store"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_mutation_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/rotation/{team}/pass"));
        assert!(paths.contains_key("/people/{person}/indicators/{which}/toggle"));
        assert!(paths.contains_key("/resource/release-request"));
        assert!(paths.contains_key("/sse/board"));
    }
}
