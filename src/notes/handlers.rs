use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::notes::dto::NoteDraft;
use crate::notes::repo::Note;
use crate::state::AppState;

pub fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/:id", put(update_note).delete(delete_note))
}

#[instrument(skip(state, draft))]
pub async fn create_note(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(draft): Json<NoteDraft>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let note = Note::create(
        &state.db,
        &session.id,
        &draft.title,
        &draft.content,
        &draft.color,
    )
    .await?;
    info!(note_id = %note.id, user_id = %session.id, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

#[instrument(skip(state, draft))]
pub async fn update_note(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Json(draft): Json<NoteDraft>,
) -> Result<Json<Note>, ApiError> {
    match Note::update_owned(
        &state.db,
        &id,
        &session.id,
        &draft.title,
        &draft.content,
        &draft.color,
    )
    .await?
    {
        Some(note) => {
            info!(note_id = %note.id, user_id = %session.id, "note updated");
            Ok(Json(note))
        }
        None => {
            warn!(note_id = %id, user_id = %session.id, "update hit a missing or foreign note");
            Err(ApiError::NotFoundOrForbidden)
        }
    }
}

#[instrument(skip(state))]
pub async fn delete_note(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !Note::delete_owned(&state.db, &id, &session.id).await? {
        warn!(note_id = %id, user_id = %session.id, "delete hit a missing or foreign note");
        return Err(ApiError::NotFoundOrForbidden);
    }
    info!(note_id = %id, user_id = %session.id, "note deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_notes(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = Note::list_for_owner(&state.db, &session.id).await?;
    Ok(Json(notes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractors::resolve_session;
    use crate::auth::handlers::{logout, register};
    use crate::auth::{dto::RegisterRequest, session::Session};
    use crate::notes::repo::now_millis;
    use axum_extra::extract::CookieJar;

    async fn signed_up(state: &AppState, username: &str) -> (CookieJar, Session) {
        let (_, jar, Json(session)) = register(
            State(state.clone()),
            CookieJar::new(),
            Json(RegisterRequest {
                username: username.into(),
                password: "hunter2hunter2".into(),
            }),
        )
        .await
        .expect("register");
        (jar, session)
    }

    fn draft(title: &str, content: &str, color: &str) -> NoteDraft {
        NoteDraft {
            title: title.into(),
            content: content.into(),
            color: color.into(),
        }
    }

    #[tokio::test]
    async fn create_then_list_roundtrip() {
        let state = AppState::test().await;
        let (_, session) = signed_up(&state, "alice").await;
        let before = now_millis();

        let (status, Json(created)) = create_note(
            State(state.clone()),
            CurrentUser(session.clone()),
            Json(draft("T", "C", "#4fc3f7")),
        )
        .await
        .expect("create");
        assert_eq!(status, StatusCode::CREATED);

        let Json(notes) = list_notes(State(state.clone()), CurrentUser(session.clone()))
            .await
            .expect("list");
        assert_eq!(notes.len(), 1);
        let note = &notes[0];
        assert_eq!(note, &created);
        assert_eq!(note.title, "T");
        assert_eq!(note.content, "C");
        assert_eq!(note.color, "#4fc3f7");
        assert_eq!(note.user_id, session.id);
        assert!(note.time >= before);
    }

    #[tokio::test]
    async fn notes_are_invisible_to_other_users() {
        let state = AppState::test().await;
        let (_, alice) = signed_up(&state, "alice").await;
        let (_, bob) = signed_up(&state, "bob").await;

        let (_, Json(note)) = create_note(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Json(draft("T", "C", "#4fc3f7")),
        )
        .await
        .expect("create");

        let Json(bobs_view) = list_notes(State(state.clone()), CurrentUser(bob.clone()))
            .await
            .expect("list");
        assert!(bobs_view.is_empty());

        let err = update_note(
            State(state.clone()),
            CurrentUser(bob.clone()),
            Path(note.id.clone()),
            Json(draft("X", "Y", "#000000")),
        )
        .await
        .expect_err("foreign update must fail");
        assert!(matches!(err, ApiError::NotFoundOrForbidden));

        let err = delete_note(
            State(state.clone()),
            CurrentUser(bob.clone()),
            Path(note.id.clone()),
        )
        .await
        .expect_err("foreign delete must fail");
        assert!(matches!(err, ApiError::NotFoundOrForbidden));

        // Alice still sees her note, unchanged.
        let Json(alices_view) = list_notes(State(state.clone()), CurrentUser(alice))
            .await
            .expect("list");
        assert_eq!(alices_view, vec![note]);
    }

    #[tokio::test]
    async fn update_refreshes_the_timestamp_and_reorders() {
        let state = AppState::test().await;
        let (_, session) = signed_up(&state, "alice").await;

        let (_, Json(first)) = create_note(
            State(state.clone()),
            CurrentUser(session.clone()),
            Json(draft("first", "a", "#fff59d")),
        )
        .await
        .expect("create");
        let (_, Json(second)) = create_note(
            State(state.clone()),
            CurrentUser(session.clone()),
            Json(draft("second", "b", "#4fc3f7")),
        )
        .await
        .expect("create");

        // Millisecond timestamps tie if the edit lands too fast.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let Json(updated) = update_note(
            State(state.clone()),
            CurrentUser(session.clone()),
            Path(first.id.clone()),
            Json(draft("first, edited", "a", "#fff59d")),
        )
        .await
        .expect("update");
        assert!(updated.time >= first.time);
        assert_eq!(updated.title, "first, edited");

        // The edited note now leads the listing.
        let Json(notes) = list_notes(State(state.clone()), CurrentUser(session))
            .await
            .expect("list");
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    }

    #[tokio::test]
    async fn delete_removes_and_repeat_delete_fails() {
        let state = AppState::test().await;
        let (_, session) = signed_up(&state, "alice").await;

        let (_, Json(note)) = create_note(
            State(state.clone()),
            CurrentUser(session.clone()),
            Json(draft("T", "C", "#4fc3f7")),
        )
        .await
        .expect("create");

        let status = delete_note(
            State(state.clone()),
            CurrentUser(session.clone()),
            Path(note.id.clone()),
        )
        .await
        .expect("delete");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(notes) = list_notes(State(state.clone()), CurrentUser(session.clone()))
            .await
            .expect("list");
        assert!(notes.is_empty());

        let err = delete_note(
            State(state.clone()),
            CurrentUser(session),
            Path(note.id),
        )
        .await
        .expect_err("second delete must fail");
        assert!(matches!(err, ApiError::NotFoundOrForbidden));
    }

    #[tokio::test]
    async fn logout_leaves_the_caller_unauthenticated() {
        let state = AppState::test().await;
        let (jar, _) = signed_up(&state, "alice").await;

        let (jar, _) = logout(jar).await;
        let resolved = resolve_session(&state, &jar).await.expect("resolve");
        assert!(resolved.is_none(), "note operations now reject with Unauthenticated");
    }
}
