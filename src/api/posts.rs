//! Post and comment forms

use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::forms::{TextForm, UploadForm};
use super::{flash, views};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::{User, UserProfile};
use crate::error::AppError;

const NOT_OWNER: &str = "You do not own this object.";

/// Feed location of a post for the viewer's pagination
async fn post_location(state: &AppState, post_id: i64, profile: &UserProfile) -> Result<String, AppError> {
    let page = state
        .board
        .post_page(post_id, profile.pagination)
        .await?
        .unwrap_or(1);
    Ok(format!("/?page={}#{}", page, post_id))
}

fn redirect_with(state: &AppState, jar: CookieJar, message: &str, location: &str) -> Response {
    let jar = flash::push(jar, message, state.secure_cookies());
    (jar, Redirect::to(location)).into_response()
}

/// Ownership failures become a flash message, everything else propagates
fn handle_forbidden(state: &AppState, jar: CookieJar, error: AppError) -> Result<Response, AppError> {
    match error {
        AppError::Forbidden => Ok(redirect_with(state, jar, NOT_OWNER, "/")),
        other => Err(other),
    }
}

fn bad_request(page: Html<String>) -> Response {
    (StatusCode::BAD_REQUEST, page).into_response()
}

async fn profile_of(state: &AppState, user: &User) -> Result<UserProfile, AppError> {
    state.db.get_or_create_profile(user.id).await
}

// =============================================================================
// Posts
// =============================================================================

/// GET /post/add
pub async fn add_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let profile = profile_of(&state, &user).await?;
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    Ok((jar, views::post_form(&ctx, &views::FormValues::default(), None)).into_response())
}

/// POST /post/add
pub async fn add_post_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let profile = profile_of(&state, &user).await?;
    let ctx = views::PageContext::for_user(&user, &profile, None);

    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(AppError::Validation(message)) => {
            return Ok(bad_request(views::post_form(
                &ctx,
                &views::FormValues::default(),
                Some(&message),
            )));
        }
        Err(error) => return Err(error),
    };
    let values = form.text.values();

    match state.posts.create_post(&user, form.into_post_input()).await {
        Ok(post) => {
            let location = post_location(&state, post.id, &profile).await?;
            Ok(redirect_with(&state, jar, "Post Successful.", &location))
        }
        Err(AppError::Validation(message)) => {
            Ok(bad_request(views::post_form(&ctx, &values, Some(&message))))
        }
        Err(error) => Err(error),
    }
}

/// GET /post/edit/:post_id
pub async fn edit_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> Result<Response, AppError> {
    let view = state.board.post_view(post_id).await?;
    if !user.can_modify(view.post.user_id) {
        return handle_forbidden(&state, jar, AppError::Forbidden);
    }

    let profile = profile_of(&state, &user).await?;
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    let values = views::FormValues {
        title: view.post.title.clone(),
        body: view.post.body.clone(),
        media_url: view.post.media_url.clone().unwrap_or_default(),
    };
    Ok((jar, views::edit_post_form(&ctx, &view, &values, None)).into_response())
}

/// POST /post/edit/:post_id
pub async fn edit_post_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(post_id): Path<i64>,
    Form(form): Form<TextForm>,
) -> Result<Response, AppError> {
    let profile = profile_of(&state, &user).await?;
    let values = form.values();

    match state.posts.edit_post(&user, post_id, form.into_edit_post()).await {
        Ok(post) => {
            let location = post_location(&state, post.id, &profile).await?;
            Ok(redirect_with(&state, jar, "Post Successfully Edited.", &location))
        }
        Err(AppError::Validation(message)) => {
            let view = state.board.post_view(post_id).await?;
            let ctx = views::PageContext::for_user(&user, &profile, None);
            Ok(bad_request(views::edit_post_form(&ctx, &view, &values, Some(&message))))
        }
        Err(error) => handle_forbidden(&state, jar, error),
    }
}

/// GET /post/delete/:post_id
pub async fn delete_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> Result<Response, AppError> {
    let post = state.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
    if !user.can_modify(post.user_id) {
        return handle_forbidden(&state, jar, AppError::Forbidden);
    }

    let profile = profile_of(&state, &user).await?;
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    let action = format!("/post/delete/{}", post_id);
    Ok((jar, views::confirm_delete(&ctx, "post", &action)).into_response())
}

/// POST /post/delete/:post_id
pub async fn delete_post_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> Result<Response, AppError> {
    match state.posts.delete_post(&user, post_id).await {
        Ok(()) => Ok(redirect_with(&state, jar, "Post Successfully Deleted.", "/")),
        Err(error) => handle_forbidden(&state, jar, error),
    }
}

// =============================================================================
// Comments
// =============================================================================

/// GET /post/:post_id/comment
pub async fn add_comment_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> Result<Response, AppError> {
    let view = state.board.post_view(post_id).await?;
    let profile = profile_of(&state, &user).await?;
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    Ok((jar, views::comment_form(&ctx, &view, &views::FormValues::default(), None)).into_response())
}

/// POST /post/:post_id/comment
pub async fn add_comment_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let profile = profile_of(&state, &user).await?;
    let ctx = views::PageContext::for_user(&user, &profile, None);

    let (form_result, values) = match UploadForm::read(multipart).await {
        Ok(form) => {
            let values = form.text.values();
            let result = state
                .posts
                .create_comment(&user, post_id, form.into_comment_input())
                .await;
            (result, values)
        }
        Err(error) => (Err(error), views::FormValues::default()),
    };

    match form_result {
        Ok(comment) => {
            let location = post_location(&state, comment.post_id, &profile).await?;
            Ok(redirect_with(&state, jar, "Comment Successful.", &location))
        }
        Err(AppError::Validation(message)) => {
            let view = state.board.post_view(post_id).await?;
            Ok(bad_request(views::comment_form(&ctx, &view, &values, Some(&message))))
        }
        Err(error) => Err(error),
    }
}

/// GET /post/:post_id/comment/edit/:comment_id
pub async fn edit_comment_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let comment = state.posts.comment_of_post(post_id, comment_id).await?;
    if !user.can_modify(comment.user_id) {
        return handle_forbidden(&state, jar, AppError::Forbidden);
    }

    let profile = profile_of(&state, &user).await?;
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    let values = views::FormValues {
        title: String::new(),
        body: comment.body,
        media_url: comment.media_url.unwrap_or_default(),
    };
    Ok((jar, views::edit_comment_form(&ctx, post_id, comment_id, &values, None)).into_response())
}

/// POST /post/:post_id/comment/edit/:comment_id
pub async fn edit_comment_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Form(form): Form<TextForm>,
) -> Result<Response, AppError> {
    let profile = profile_of(&state, &user).await?;
    let values = form.values();

    match state
        .posts
        .edit_comment(&user, post_id, comment_id, form.into_edit_comment())
        .await
    {
        Ok(comment) => {
            let location = post_location(&state, comment.post_id, &profile).await?;
            Ok(redirect_with(&state, jar, "Comment Successfully Edited.", &location))
        }
        Err(AppError::Validation(message)) => {
            let ctx = views::PageContext::for_user(&user, &profile, None);
            Ok(bad_request(views::edit_comment_form(
                &ctx,
                post_id,
                comment_id,
                &values,
                Some(&message),
            )))
        }
        Err(error) => handle_forbidden(&state, jar, error),
    }
}

/// GET /post/:post_id/comment/delete/:comment_id
pub async fn delete_comment_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let comment = state.posts.comment_of_post(post_id, comment_id).await?;
    if !user.can_modify(comment.user_id) {
        return handle_forbidden(&state, jar, AppError::Forbidden);
    }

    let profile = profile_of(&state, &user).await?;
    let (jar, message) = flash::take(jar);
    let ctx = views::PageContext::for_user(&user, &profile, message);
    let action = format!("/post/{}/comment/delete/{}", post_id, comment_id);
    Ok((jar, views::confirm_delete(&ctx, "comment", &action)).into_response())
}

/// POST /post/:post_id/comment/delete/:comment_id
///
/// Redirects back to the page now holding the post.
pub async fn delete_comment_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    match state.posts.delete_comment(&user, post_id, comment_id).await {
        Ok(()) => {
            let profile = profile_of(&state, &user).await?;
            let location = post_location(&state, post_id, &profile).await?;
            Ok(redirect_with(&state, jar, "Comment Successfully Deleted.", &location))
        }
        Err(error) => handle_forbidden(&state, jar, error),
    }
}
