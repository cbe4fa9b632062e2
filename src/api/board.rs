//! Feed, gallery and profile pages

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::forms::ProfileForm;
use super::{flash, views};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// `?page=` parameter, kept raw so junk falls back to page one
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let profile = state.db.get_or_create_profile(user.id).await?;
    let board = state.board.feed(&profile, query.page.as_deref()).await?;
    let activity = state.activity.latest(&profile).await?;

    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    Ok((jar, views::feed(&ctx, &board, &activity)).into_response())
}

/// GET /gallery
pub async fn gallery(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let profile = state.db.get_or_create_profile(user.id).await?;
    let board = state.board.gallery(query.page.as_deref()).await?;

    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    Ok((jar, views::gallery(&ctx, &board)).into_response())
}

/// GET /profile
pub async fn profile_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let profile = state.db.get_or_create_profile(user.id).await?;

    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    Ok((jar, views::profile_form(&ctx, &profile, None)).into_response())
}

/// POST /profile
pub async fn profile_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let profile = state.db.get_or_create_profile(user.id).await?;

    let updated = form.parse().and_then(|(pagination, comment_filter, activity, nightmode)| {
        profile.with_choices(pagination, comment_filter, activity, nightmode)
    });

    match updated {
        Ok(updated) => {
            state.db.update_profile(&updated).await?;
            tracing::info!(user = %user.username, "Profile updated");

            let jar = flash::push(jar, "Profile Successfully Updated.", state.secure_cookies());
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(AppError::Validation(message)) => {
            let ctx = views::PageContext::for_user(&user, &profile, None);
            Ok((
                StatusCode::BAD_REQUEST,
                views::profile_form(&ctx, &profile, Some(&message)),
            )
                .into_response())
        }
        Err(error) => Err(error),
    }
}
