//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the read-later and listen-later REST
//! endpoints and the master definition for the OpenAPI specification.
//!
//! Every handler works on the caller's cached list session. Store failures
//! never surface as HTTP errors on their own: the core services turn them into
//! an outcome plus a notice, and the handler maps the outcome to a status.

use crate::web::dto::*;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use playlist_core::domain::MutationOutcome;
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_read_later_handler,
        add_read_later_handler,
        remove_read_later_handler,
        mark_read_handler,
        reading_progress_handler,
        clear_read_handler,
        read_later_contains_handler,
        list_listen_later_handler,
        add_listen_later_handler,
        remove_listen_later_handler,
        mark_played_handler,
        listen_progress_handler,
        reorder_handler,
        clear_played_handler,
        listen_later_contains_handler,
    ),
    components(
        schemas(
            AddReadLaterRequest, MarkReadRequest, ReadingProgressRequest,
            AddListenLaterRequest, MarkPlayedRequest, ListenProgressRequest, ReorderRequest,
            AudioVersionDto, OutcomeDto, CategoryDto, ArticleCardDto, AudioRenditionDto,
            ReadingListEntryDto, ListenQueueEntryDto, ReadingListResponse, ListenQueueResponse,
            ReadingListMutationResponse, ListenQueueMutationResponse, ContainsResponse,
        )
    ),
    tags(
        (name = "Playlists API", description = "Read-later list and listen-later queue of a reader.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

type HandlerError = (StatusCode, String);

/// Reads the caller's id from the `x-user-id` header.
fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str.trim()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

/// `created` is the status used when an insert was applied.
fn status_for(outcome: MutationOutcome, created: bool) -> StatusCode {
    match outcome {
        MutationOutcome::Applied if created => StatusCode::CREATED,
        MutationOutcome::Applied | MutationOutcome::Unchanged => StatusCode::OK,
        MutationOutcome::Failed => StatusCode::BAD_GATEWAY,
    }
}

//=========================================================================================
// Read Later Handlers
//=========================================================================================

/// List the caller's saved articles, most recently added first.
#[utoipa::path(
    get,
    path = "/read-later",
    responses((status = 200, description = "Reading list", body = ReadingListResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_read_later_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut reading = lists.reading().await;
    reading.list(user_id).await;
    Ok(Json(ReadingListResponse::from(&*reading)))
}

/// Save an article for later.
#[utoipa::path(
    post,
    path = "/read-later",
    request_body = AddReadLaterRequest,
    responses(
        (status = 201, description = "Article saved", body = ReadingListMutationResponse),
        (status = 200, description = "Article was already saved", body = ReadingListMutationResponse),
        (status = 502, description = "The store rejected the change", body = ReadingListMutationResponse)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn add_read_later_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AddReadLaterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut reading = lists.reading().await;
    let outcome = reading.add(user_id, body.article_id).await;
    Ok(reading_mutation(outcome, &reading, true))
}

/// Remove a saved article.
#[utoipa::path(
    delete,
    path = "/read-later/{id}",
    responses(
        (status = 200, description = "Entry removed", body = ReadingListMutationResponse),
        (status = 502, description = "The store rejected the change", body = ReadingListMutationResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Reading list entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn remove_read_later_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut reading = lists.reading().await;
    let outcome = reading.remove(user_id, entry_id).await;
    Ok(reading_mutation(outcome, &reading, false))
}

/// Mark a saved article as read or unread.
#[utoipa::path(
    put,
    path = "/read-later/{id}/read",
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Status updated", body = ReadingListMutationResponse),
        (status = 502, description = "The store rejected the change", body = ReadingListMutationResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Reading list entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn mark_read_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut reading = lists.reading().await;
    let outcome = reading.mark_read(user_id, entry_id, body.is_read).await;
    Ok(reading_mutation(outcome, &reading, false))
}

/// Record how far the article has been read. Best-effort.
#[utoipa::path(
    put,
    path = "/read-later/{id}/progress",
    request_body = ReadingProgressRequest,
    responses((status = 204, description = "Progress accepted")),
    params(
        ("id" = Uuid, Path, description = "Reading list entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn reading_progress_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<ReadingProgressRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    lists.reading().await.update_progress(user_id, entry_id, body.progress).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every article already read.
#[utoipa::path(
    post,
    path = "/read-later/clear-read",
    responses(
        (status = 200, description = "Read entries cleared", body = ReadingListMutationResponse),
        (status = 502, description = "The store rejected the change", body = ReadingListMutationResponse)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn clear_read_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut reading = lists.reading().await;
    let outcome = reading.clear_read(user_id).await;
    Ok(reading_mutation(outcome, &reading, false))
}

/// Whether the article is saved.
#[utoipa::path(
    get,
    path = "/read-later/contains/{article_id}",
    responses((status = 200, description = "Membership", body = ContainsResponse)),
    params(
        ("article_id" = Uuid, Path, description = "Article id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn read_later_contains_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(article_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let in_list = lists.reading().await.is_in_list(article_id);
    Ok(Json(ContainsResponse { article_id, in_list }))
}

fn reading_mutation(
    outcome: MutationOutcome,
    reading: &playlist_core::ReadingListService,
    created: bool,
) -> (StatusCode, Json<ReadingListMutationResponse>) {
    (
        status_for(outcome, created),
        Json(ReadingListMutationResponse {
            outcome: outcome.into(),
            list: reading.into(),
        }),
    )
}

//=========================================================================================
// Listen Later Handlers
//=========================================================================================

/// List the caller's queue in playback order.
#[utoipa::path(
    get,
    path = "/listen-later",
    responses((status = 200, description = "Listen queue", body = ListenQueueResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_listen_later_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut queue = lists.queue().await;
    queue.list(user_id).await;
    Ok(Json(ListenQueueResponse::from(&*queue)))
}

/// Append a rendition of an article to the queue.
#[utoipa::path(
    post,
    path = "/listen-later",
    request_body = AddListenLaterRequest,
    responses(
        (status = 201, description = "Rendition queued", body = ListenQueueMutationResponse),
        (status = 200, description = "Rendition was already queued", body = ListenQueueMutationResponse),
        (status = 502, description = "The store rejected the change", body = ListenQueueMutationResponse)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn add_listen_later_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AddListenLaterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut queue = lists.queue().await;
    let outcome = queue.add(user_id, body.article_id, body.version.into()).await;
    Ok(queue_mutation(outcome, &queue, true))
}

/// Remove an entry from the queue.
#[utoipa::path(
    delete,
    path = "/listen-later/{id}",
    responses(
        (status = 200, description = "Entry removed", body = ListenQueueMutationResponse),
        (status = 502, description = "The store rejected the change", body = ListenQueueMutationResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Queue entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn remove_listen_later_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut queue = lists.queue().await;
    let outcome = queue.remove(user_id, entry_id).await;
    Ok(queue_mutation(outcome, &queue, false))
}

/// Mark an entry as played or unplayed.
#[utoipa::path(
    put,
    path = "/listen-later/{id}/played",
    request_body = MarkPlayedRequest,
    responses(
        (status = 200, description = "Status updated", body = ListenQueueMutationResponse),
        (status = 502, description = "The store rejected the change", body = ListenQueueMutationResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Queue entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn mark_played_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<MarkPlayedRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut queue = lists.queue().await;
    let outcome = queue.mark_played(user_id, entry_id, body.is_played).await;
    Ok(queue_mutation(outcome, &queue, false))
}

/// Checkpoint the playback position. Best-effort.
#[utoipa::path(
    put,
    path = "/listen-later/{id}/progress",
    request_body = ListenProgressRequest,
    responses((status = 204, description = "Progress accepted")),
    params(
        ("id" = Uuid, Path, description = "Queue entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn listen_progress_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<ListenProgressRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    lists.queue().await.update_progress(user_id, entry_id, body.seconds).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Move an entry to a new queue position. The returned list keeps its old
/// order; fetch the queue again to see the new one.
#[utoipa::path(
    put,
    path = "/listen-later/{id}/order",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Order updated", body = ListenQueueMutationResponse),
        (status = 502, description = "The store rejected the change", body = ListenQueueMutationResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Queue entry id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn reorder_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<ReorderRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut queue = lists.queue().await;
    let outcome = queue.reorder(user_id, entry_id, body.queue_order).await;
    Ok(queue_mutation(outcome, &queue, false))
}

/// Delete every played entry.
#[utoipa::path(
    post,
    path = "/listen-later/clear-played",
    responses(
        (status = 200, description = "Played entries cleared", body = ListenQueueMutationResponse),
        (status = 502, description = "The store rejected the change", body = ListenQueueMutationResponse)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn clear_played_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let mut queue = lists.queue().await;
    let outcome = queue.clear_played(user_id).await;
    Ok(queue_mutation(outcome, &queue, false))
}

/// Whether any rendition of the article is queued.
#[utoipa::path(
    get,
    path = "/listen-later/contains/{article_id}",
    responses((status = 200, description = "Membership", body = ContainsResponse)),
    params(
        ("article_id" = Uuid, Path, description = "Article id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn listen_later_contains_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(article_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let lists = app_state.lists_for(user_id).await;
    let in_list = lists.queue().await.is_in_list(article_id);
    Ok(Json(ContainsResponse { article_id, in_list }))
}

fn queue_mutation(
    outcome: MutationOutcome,
    queue: &playlist_core::ListenQueueService,
    created: bool,
) -> (StatusCode, Json<ListenQueueMutationResponse>) {
    (
        status_for(outcome, created),
        Json(ListenQueueMutationResponse {
            outcome: outcome.into(),
            list: queue.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::MemoryLists;
    use axum::http::HeaderValue;
    use serde_json::Value;

    fn app_state() -> (Arc<AppState>, Arc<MemoryLists>) {
        let config = Config::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/test".to_string())
        })
        .expect("config");
        let store = MemoryLists::new();
        let state = AppState::new(Arc::new(config), store.clone(), store.clone());
        (Arc::new(state), store)
    }

    fn user_headers(user_id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-user-id",
            HeaderValue::from_str(&user_id.to_string()).expect("header"),
        );
        headers
    }

    async fn into_parts(
        result: Result<impl IntoResponse, HandlerError>,
    ) -> (StatusCode, Value) {
        let response = result.expect("handler").into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn saving_an_article_twice_keeps_one_entry() {
        let (state, store) = app_state();
        let user = Uuid::new_v4();
        let article_id = Uuid::new_v4();

        let (status, body) = into_parts(
            add_read_later_handler(
                State(state.clone()),
                user_headers(user),
                Json(AddReadLaterRequest { article_id }),
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["outcome"], "applied");

        let (status, body) = into_parts(
            add_read_later_handler(
                State(state.clone()),
                user_headers(user),
                Json(AddReadLaterRequest { article_id }),
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "unchanged");
        assert_eq!(body["list"]["entries"].as_array().map(Vec::len), Some(1));

        let (_, body) =
            into_parts(list_read_later_handler(State(state), user_headers(user)).await).await;
        assert_eq!(body["total_unread"], 1);
        assert_eq!(store.reading.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn each_rendition_is_queued_once() {
        let (state, store) = app_state();
        let user = Uuid::new_v4();
        let article_id = Uuid::new_v4();
        let add = |version| {
            add_listen_later_handler(
                State(state.clone()),
                user_headers(user),
                Json(AddListenLaterRequest { article_id, version }),
            )
        };

        let (status, _) = into_parts(add(AudioVersionDto::Summary).await).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = into_parts(add(AudioVersionDto::Summary).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "unchanged");
        let (status, body) = into_parts(add(AudioVersionDto::Full).await).await;
        assert_eq!(status, StatusCode::CREATED);

        let orders: Vec<_> = body["list"]["entries"]
            .as_array()
            .map(|entries| entries.iter().map(|e| e["queue_order"].clone()).collect())
            .unwrap_or_default();
        assert_eq!(orders, vec![Value::from(1), Value::from(2)]);
        assert_eq!(store.queue.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn another_users_entry_cannot_be_removed() {
        let (state, store) = app_state();
        let (owner, intruder) = (Uuid::new_v4(), Uuid::new_v4());
        into_parts(
            add_listen_later_handler(
                State(state.clone()),
                user_headers(owner),
                Json(AddListenLaterRequest {
                    article_id: Uuid::new_v4(),
                    version: AudioVersionDto::Full,
                }),
            )
            .await,
        )
        .await;
        let entry_id = store.queue.lock().unwrap()[0].id;

        let (status, body) = into_parts(
            remove_listen_later_handler(State(state.clone()), user_headers(intruder), Path(entry_id))
                .await,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["outcome"], "failed");
        assert_eq!(store.queue.lock().unwrap().len(), 1);
        let owner_lists = state.lists_for(owner).await;
        assert_eq!(owner_lists.queue().await.entries().len(), 1);
    }

    #[test]
    fn user_header_is_required_and_parsed() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            user_id_from_headers(&headers).unwrap_err().0,
            StatusCode::BAD_REQUEST
        );

        headers.insert("x-user-id", HeaderValue::from_static("not-a-uuid"));
        assert_eq!(
            user_id_from_headers(&headers).unwrap_err().0,
            StatusCode::BAD_REQUEST
        );

        let id = Uuid::new_v4();
        headers.insert(
            "x-user-id",
            HeaderValue::from_str(&id.to_string()).expect("header"),
        );
        assert_eq!(user_id_from_headers(&headers).expect("user id"), id);
    }

    #[test]
    fn outcomes_map_to_statuses() {
        assert_eq!(status_for(MutationOutcome::Applied, true), StatusCode::CREATED);
        assert_eq!(status_for(MutationOutcome::Applied, false), StatusCode::OK);
        assert_eq!(status_for(MutationOutcome::Unchanged, true), StatusCode::OK);
        assert_eq!(status_for(MutationOutcome::Failed, false), StatusCode::BAD_GATEWAY);
    }
}
