use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use marquee_core::catalog::NowPlayingMovie;
use marquee_core::ledger::SeatState;
use marquee_core::show::ShowInstance;
use marquee_shared::{MovieId, SeatLabel, ShowId};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateShowsRequest {
    movie_id: String,
    /// Per-seat price in minor currency units.
    price: i64,
    seat_layout: Vec<String>,
    /// One show instance is created per entry.
    showtimes: Vec<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct ShowResponse {
    id: ShowId,
    movie_id: MovieId,
    start_time: DateTime<Utc>,
    price: i64,
    seat_layout: Vec<SeatLabel>,
    is_cancelled: bool,
}

impl From<ShowInstance> for ShowResponse {
    fn from(show: ShowInstance) -> Self {
        Self {
            id: show.id,
            movie_id: show.movie_id,
            start_time: show.start_time,
            price: show.price,
            seat_layout: show.seat_layout,
            is_cancelled: show.is_cancelled,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/shows", get(list_shows))
        .route("/v1/shows/{id}", get(get_show))
        .route("/v1/shows/{id}/seats", get(seat_map))
        .route("/v1/shows/{id}/stream", get(seat_stream))
        .route("/v1/admin/shows", post(create_shows))
        .route("/v1/admin/shows/{id}", delete(cancel_show))
        .route("/v1/movies/now-playing", get(now_playing))
}

async fn create_shows(
    State(state): State<AppState>,
    Json(req): Json<CreateShowsRequest>,
) -> Result<(StatusCode, Json<Vec<ShowResponse>>), AppError> {
    let layout: Vec<SeatLabel> = req.seat_layout.into_iter().map(SeatLabel::new).collect();
    let created = state
        .registry
        .create_schedule(MovieId::new(req.movie_id), &req.showtimes, req.price, layout)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(ShowResponse::from).collect()),
    ))
}

async fn list_shows(State(state): State<AppState>) -> Result<Json<Vec<ShowResponse>>, AppError> {
    let shows = state.registry.list_shows().await?;
    Ok(Json(shows.into_iter().map(ShowResponse::from).collect()))
}

async fn get_show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShowResponse>, AppError> {
    let show = state.registry.get_show(ShowId::from_uuid(id)).await?;
    Ok(Json(show.into()))
}

async fn cancel_show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.registry.cancel_show(ShowId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn seat_map(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BTreeMap<SeatLabel, SeatState>>, AppError> {
    let snapshot = state.ledger.snapshot(ShowId::from_uuid(id)).await?;
    Ok(Json(snapshot))
}

/// Live seat updates for one show, so seat maps refresh without polling.
async fn seat_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let show_id = ShowId::from_uuid(id);
    let rx = state.seat_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.show_id == show_id => serde_json::to_string(&event)
            .ok()
            .map(|payload| Ok(Event::default().event("seat_update").data(payload))),
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn now_playing(
    State(state): State<AppState>,
) -> Result<Json<Vec<NowPlayingMovie>>, AppError> {
    let movies = state
        .catalog
        .fetch_now_playing()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("catalog fetch failed: {e}")))?;
    Ok(Json(movies))
}
