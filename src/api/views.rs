//! Server-side HTML rendering
//!
//! Pages are plain HTML strings; every user-supplied value is escaped.

use axum::response::Html;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::data::{
    ACTIVITY_CHOICES, ActivityItem, COMMENT_FILTER_CHOICES, PAGINATION_CHOICES, User, UserProfile,
};
use crate::service::pagination::Page;
use crate::service::{BoardPage, CommentView, EmbedView, MediaView, PostView};

/// Per-request page chrome
pub struct PageContext<'a> {
    pub user: Option<&'a User>,
    pub nightmode: bool,
    pub flash: Option<String>,
}

impl<'a> PageContext<'a> {
    pub fn anonymous(flash: Option<String>) -> Self {
        Self {
            user: None,
            nightmode: false,
            flash,
        }
    }

    pub fn for_user(user: &'a User, profile: &UserProfile, flash: Option<String>) -> Self {
        Self {
            user: Some(user),
            nightmode: profile.nightmode,
            flash,
        }
    }
}

/// Wrap page content in the site layout
pub fn layout(ctx: &PageContext<'_>, title: &str, content: &str) -> Html<String> {
    let body_class = if ctx.nightmode { "night" } else { "day" };

    let nav = match ctx.user {
        Some(user) => format!(
            r#"<nav><a href="/">Board</a> <a href="/gallery">Gallery</a> <a href="/post/add">New post</a> <a href="/profile">Profile</a> <span class="user">{}</span> <form method="post" action="/logout" class="inline"><button type="submit">Log out</button></form></nav>"#,
            text(&user.username)
        ),
        None => r#"<nav><a href="/login">Log in</a></nav>"#.to_string(),
    };

    let flash = ctx
        .flash
        .as_deref()
        .map(|message| format!(r#"<p class="flash">{}</p>"#, text(message)))
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - Imageboard</title></head>
<body class="{body_class}">
{nav}
{flash}
<main>
{content}
</main>
</body>
</html>"#,
        title = text(title),
    ))
}

// =============================================================================
// Board pages
// =============================================================================

/// Feed page with latest activity
pub fn feed(ctx: &PageContext<'_>, board: &BoardPage, activity: &[ActivityItem]) -> Html<String> {
    let mut content = String::new();

    content.push_str(r#"<aside class="activity"><h3>Latest activity</h3><ul>"#);
    for item in activity {
        let verb = match item.kind {
            crate::data::ActivityKind::Post => "posted",
            crate::data::ActivityKind::Comment => "commented on",
        };
        content.push_str(&format!(
            r#"<li class="{kind}">{user} {verb} <a href="/?page={page}#{post_id}">{title}</a></li>"#,
            kind = item.kind.as_str(),
            user = text(&item.username),
            page = item.post_page,
            post_id = item.post_id,
            title = text(&item.post_title),
        ));
    }
    content.push_str("</ul></aside>");

    for view in &board.posts {
        content.push_str(&post(ctx.user, view, true));
    }
    if board.posts.is_empty() {
        content.push_str(r#"<p class="empty">No posts yet.</p>"#);
    }
    content.push_str(&pagination("/", &board.page));

    layout(ctx, "Board", &content)
}

/// Gallery page
pub fn gallery(ctx: &PageContext<'_>, board: &BoardPage) -> Html<String> {
    let mut content = String::from(r#"<section class="gallery">"#);
    for view in &board.posts {
        let Some(media) = &view.media else { continue };
        content.push_str(&format!(
            r#"<figure id="{id}">{media}<figcaption><a href="/post/{id}/comment">{title}</a></figcaption></figure>"#,
            id = view.post.id,
            media = media_tag(media),
            title = text(&view.post.title),
        ));
    }
    content.push_str("</section>");
    content.push_str(&pagination("/gallery", &board.page));

    layout(ctx, "Gallery", &content)
}

fn post(viewer: Option<&User>, view: &PostView, with_comments: bool) -> String {
    let p = &view.post;
    let mut html = format!(
        r#"<article class="post" id="{id}"><h2>{title}</h2><p class="meta">{user} &middot; {created}</p>"#,
        id = p.id,
        title = text(&p.title),
        user = text(&p.username),
        created = p.created_at.format("%Y-%m-%d %H:%M"),
    );

    if let Some(media) = &view.media {
        html.push_str(&media_tag(media));
    }
    if let Some(embed) = &view.embed {
        html.push_str(&embed_tag(embed));
    }
    html.push_str(&body_text(&p.body));

    if with_comments {
        html.push_str(&format!(
            r#"<p class="actions"><a href="/post/{id}/comment">Comment</a>"#,
            id = p.id
        ));
        if viewer.is_some_and(|user| user.can_modify(p.user_id)) {
            html.push_str(&format!(
                r#" <a href="/post/edit/{id}">Edit</a> <a href="/post/delete/{id}">Delete</a>"#,
                id = p.id
            ));
        }
        html.push_str("</p>");

        html.push_str(r#"<section class="comments">"#);
        if view.hidden_comments > 0 {
            html.push_str(&format!(
                r#"<p class="hidden-comments">{} older comments hidden</p>"#,
                view.hidden_comments
            ));
        }
        for comment_view in &view.comments {
            html.push_str(&comment(viewer, comment_view));
        }
        html.push_str("</section>");
    }

    html.push_str("</article>");
    html
}

fn comment(viewer: Option<&User>, view: &CommentView) -> String {
    let c = &view.comment;
    let mut html = format!(
        r#"<div class="comment" id="c{id}"><p class="meta">{user} &middot; {created}</p>"#,
        id = c.id,
        user = text(&c.username),
        created = c.created_at.format("%Y-%m-%d %H:%M"),
    );

    if let Some(media) = &view.media {
        html.push_str(&media_tag(media));
    }
    if let Some(embed) = &view.embed {
        html.push_str(&embed_tag(embed));
    }
    html.push_str(&body_text(&c.body));

    if viewer.is_some_and(|user| user.can_modify(c.user_id)) {
        html.push_str(&format!(
            r#"<p class="actions"><a href="/post/{post_id}/comment/edit/{id}">Edit</a> <a href="/post/{post_id}/comment/delete/{id}">Delete</a></p>"#,
            post_id = c.post_id,
            id = c.id,
        ));
    }

    html.push_str("</div>");
    html
}

fn media_tag(media: &MediaView) -> String {
    if media.is_video() {
        return format!(
            r#"<video src="{}" controls loop muted preload="metadata"></video>"#,
            attr(&media.url)
        );
    }

    // Animated images play in place, so the full file is shown
    let src = match (&media.thumbnail_url, media.animated) {
        (Some(thumbnail), false) => thumbnail.as_str(),
        _ => media.url.as_str(),
    };
    let class = if media.animated { "media animated" } else { "media" };

    format!(
        r#"<a href="{href}"><img class="{class}" src="{src}" alt=""></a>"#,
        href = attr(&media.url),
        src = attr(src),
    )
}

fn embed_tag(embed: &EmbedView) -> String {
    let caption = embed
        .info
        .as_ref()
        .and_then(|info| info.title.as_deref())
        .map(|title| format!(r#"<figcaption>{}</figcaption>"#, text(title)))
        .unwrap_or_default();

    format!(
        r#"<figure class="embed {backend}"><iframe src="{src}" width="{width}" height="{height}" frameborder="0" allowfullscreen></iframe>{caption}</figure>"#,
        backend = embed.backend.to_ascii_lowercase(),
        src = attr(&embed.player_url),
        width = embed.width,
        height = embed.height,
    )
}

fn body_text(body: &str) -> String {
    format!(
        r#"<div class="body">{}</div>"#,
        text(body).replace('\n', "<br>")
    )
}

fn pagination(base: &str, page: &Page) -> String {
    let link = |number: i64, label: &str| format!(r#"<a href="{base}?page={number}">{label}</a>"#);

    let mut parts = Vec::new();
    if let Some(n) = page.previous_previous() {
        parts.push(link(n, &n.to_string()));
    }
    if let Some(n) = page.previous() {
        parts.push(link(n, &n.to_string()));
    }
    parts.push(format!(r#"<span class="current">{}</span>"#, page.number));
    if let Some(n) = page.next() {
        parts.push(link(n, &n.to_string()));
    }
    if let Some(n) = page.next_next() {
        parts.push(link(n, &n.to_string()));
    }

    format!(
        r#"<nav class="pagination">{} <span class="total">of {}</span></nav>"#,
        parts.join(" "),
        page.num_pages
    )
}

// =============================================================================
// Forms
// =============================================================================

/// Values echoed back into a form after a failed submission
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    pub title: String,
    pub body: String,
    pub media_url: String,
}

fn form_error(error: Option<&str>) -> String {
    error
        .map(|message| format!(r#"<p class="error">{}</p>"#, text(message)))
        .unwrap_or_default()
}

fn text_fields(values: &FormValues, with_title: bool) -> String {
    let title = if with_title {
        format!(
            r#"<label>Title <input name="title" maxlength="200" value="{}" required></label>"#,
            attr(&values.title)
        )
    } else {
        String::new()
    };

    format!(
        r#"{title}<label>Body <textarea name="body" required>{body}</textarea></label><label>Media link <input name="media_url" value="{media_url}"></label>"#,
        body = text(&values.body),
        media_url = attr(&values.media_url),
    )
}

/// New post form (multipart, image required)
pub fn post_form(ctx: &PageContext<'_>, values: &FormValues, error: Option<&str>) -> Html<String> {
    let content = format!(
        r#"<h1>New post</h1>{error}<form method="post" action="/post/add" enctype="multipart/form-data">{fields}<label>Image <input type="file" name="image" required></label><button type="submit">Post</button></form>"#,
        error = form_error(error),
        fields = text_fields(values, true),
    );
    layout(ctx, "New post", &content)
}

/// Edit post form
pub fn edit_post_form(
    ctx: &PageContext<'_>,
    view: &PostView,
    values: &FormValues,
    error: Option<&str>,
) -> Html<String> {
    let content = format!(
        r#"<h1>Edit post</h1>{error}{preview}<form method="post" action="/post/edit/{id}">{fields}<button type="submit">Save</button></form>"#,
        error = form_error(error),
        preview = post(ctx.user, view, false),
        id = view.post.id,
        fields = text_fields(values, true),
    );
    layout(ctx, "Edit post", &content)
}

/// New comment form (multipart, image optional)
pub fn comment_form(
    ctx: &PageContext<'_>,
    view: &PostView,
    values: &FormValues,
    error: Option<&str>,
) -> Html<String> {
    let content = format!(
        r#"<h1>Comment</h1>{error}{preview}<form method="post" action="/post/{id}/comment" enctype="multipart/form-data">{fields}<label>Image <input type="file" name="image"></label><button type="submit">Comment</button></form>"#,
        error = form_error(error),
        preview = post(ctx.user, view, false),
        id = view.post.id,
        fields = text_fields(values, false),
    );
    layout(ctx, "Comment", &content)
}

/// Edit comment form
pub fn edit_comment_form(
    ctx: &PageContext<'_>,
    post_id: i64,
    comment_id: i64,
    values: &FormValues,
    error: Option<&str>,
) -> Html<String> {
    let content = format!(
        r#"<h1>Edit comment</h1>{error}<form method="post" action="/post/{post_id}/comment/edit/{comment_id}">{fields}<button type="submit">Save</button></form>"#,
        error = form_error(error),
        fields = text_fields(values, false),
    );
    layout(ctx, "Edit comment", &content)
}

/// Delete confirmation for a post or comment
pub fn confirm_delete(ctx: &PageContext<'_>, what: &str, action: &str) -> Html<String> {
    let content = format!(
        r#"<h1>Delete {what}</h1><p>Are you sure you want to delete this {what}?</p><form method="post" action="{action}"><button type="submit">Delete</button> <a href="/">Cancel</a></form>"#,
        what = text(what),
        action = attr(action),
    );
    layout(ctx, "Delete", &content)
}

/// Profile settings form
pub fn profile_form(ctx: &PageContext<'_>, profile: &UserProfile, error: Option<&str>) -> Html<String> {
    let select = |name: &str, choices: &[i64], current: i64| {
        let options: String = choices
            .iter()
            .map(|choice| {
                let selected = if *choice == current { " selected" } else { "" };
                format!(r#"<option value="{choice}"{selected}>{choice}</option>"#)
            })
            .collect();
        format!(r#"<label>{name} <select name="{name}">{options}</select></label>"#)
    };

    let content = format!(
        r#"<h1>Profile</h1>{error}<form method="post" action="/profile">{pagination}{comment_filter}{activity}<label>Night mode <input type="checkbox" name="nightmode" value="on"{checked}></label><button type="submit">Save</button></form>"#,
        error = form_error(error),
        pagination = select("pagination", &PAGINATION_CHOICES, profile.pagination),
        comment_filter = select("comment_filter", &COMMENT_FILTER_CHOICES, profile.comment_filter),
        activity = select("activity", &ACTIVITY_CHOICES, profile.activity),
        checked = if profile.nightmode { " checked" } else { "" },
    );
    layout(ctx, "Profile", &content)
}

/// Login form
pub fn login_form(ctx: &PageContext<'_>, next: &str, username: &str) -> Html<String> {
    let content = format!(
        r#"<h1>Log in</h1><form method="post" action="/login"><input type="hidden" name="next" value="{next}"><label>Username <input name="username" value="{username}" required></label><label>Password <input type="password" name="password" required></label><button type="submit">Log in</button></form>"#,
        next = attr(next),
        username = attr(username),
    );
    layout(ctx, "Log in", &content)
}
