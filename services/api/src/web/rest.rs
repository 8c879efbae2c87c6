//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth;
use crate::web::feed::ChangeKind;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use classroom_core::service::{PostView, QuestionBoard, TapView, UnderstandingReport};
use classroom_core::understanding::Tally;
use classroom_core::{
    AuthIdentity, ClassDay, Classroom, Color, DateKey, PortError, PortResult, Question,
    SessionWindow,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_courses_handler,
        course_roster_handler,
        auth::registered_handler,
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        clock_handler,
        get_understanding_handler,
        submit_tap_handler,
        understanding_history_handler,
        get_questions_handler,
        submit_post_handler,
        edit_post_handler,
        delete_post_handler,
        get_window_handler,
        set_window_handler,
    ),
    components(
        schemas(
            HealthResponse, CourseResponse, MeetingResponse, RosterResponse,
            auth::RegisteredResponse, auth::RegisterRequest, auth::LoginRequest,
            auth::IdentityResponse, ClockResponse, TallyResponse, MissingResponse,
            HistoryResponse, UnderstandingResponse, TapRequest, TapResponse,
            TapViewResponse, PostResponse, ThreadResponse, QuestionBoardResponse,
            PostRequest, EditPostRequest, QuestionResponse, DeletedResponse,
            WindowResponse, WindowRequest
        )
    ),
    tags(
        (name = "Classroom Pulse API", description = "Understanding checks, threaded questions and session windows for a live class.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The single translation from core errors to HTTP responses.
pub fn port_error(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::Validation(message) => (StatusCode::BAD_REQUEST, message),
        PortError::AlreadyRegistered => (StatusCode::CONFLICT, e.to_string()),
        PortError::NotRegistered => (StatusCode::NOT_FOUND, e.to_string()),
        PortError::WrongPin | PortError::Unauthorized => (StatusCode::UNAUTHORIZED, e.to_string()),
        PortError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::BackendUnavailable(cause) => {
            error!("Backend unavailable: {}", cause);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "The service is temporarily unavailable. Please try again.".to_string(),
            )
        }
    }
}

fn class_day(course: String, date: &str) -> Result<ClassDay, (StatusCode, String)> {
    let date_key = date
        .parse::<DateKey>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(ClassDay::new(course, date_key))
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeetingResponse {
    pub weekday: String,
    pub start_minute: u16,
    pub end_minute: u16,
}

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: String,
    pub label: String,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub meetings: Vec<MeetingResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct RosterResponse {
    pub course: String,
    pub students: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ClockResponse {
    pub date_key: String,
    pub minute_of_day: u16,
    pub weekday: String,
    pub timezone: String,
    pub policy: String,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ViewQuery {
    /// Replace student names with "Student N" labels.
    #[serde(default)]
    pub hide_names: bool,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct TallyResponse {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
    pub total: usize,
    pub red_percent: f64,
    pub yellow_percent: f64,
    pub green_percent: f64,
}

impl From<Tally> for TallyResponse {
    fn from(tally: Tally) -> Self {
        Self {
            red: tally.red,
            yellow: tally.yellow,
            green: tally.green,
            total: tally.total(),
            red_percent: tally.percent(Color::Red),
            yellow_percent: tally.percent(Color::Yellow),
            green_percent: tally.percent(Color::Green),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct MissingResponse {
    pub count: usize,
    /// Withheld while names are hidden.
    pub names: Option<Vec<String>>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct HistoryResponse {
    pub display_name: String,
    pub taps: TallyResponse,
}

/// Current color counts for a class day. The roster and per-person detail are
/// present for the instructor only.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct UnderstandingResponse {
    pub course: String,
    pub date_key: String,
    pub can_submit: bool,
    pub tally: TallyResponse,
    pub missing: Option<MissingResponse>,
    pub histories: Option<Vec<HistoryResponse>>,
}

impl UnderstandingResponse {
    fn new(report: UnderstandingReport, can_submit: bool) -> Self {
        Self {
            course: report.day.course,
            date_key: report.day.date_key.to_string(),
            can_submit,
            tally: report.tally.into(),
            missing: report.missing.map(|m| MissingResponse {
                count: m.count,
                names: m.names,
            }),
            histories: report.histories.map(|hs| {
                hs.into_iter()
                    .map(|h| HistoryResponse {
                        display_name: h.display_name,
                        taps: h.taps.into(),
                    })
                    .collect()
            }),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct TapRequest {
    /// `red`, `yellow` or `green`.
    pub color: String,
}

#[derive(Serialize, ToSchema)]
pub struct TapResponse {
    pub id: Uuid,
    pub from_color: Option<String>,
    pub to_color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct TapViewResponse {
    pub id: Uuid,
    pub role: String,
    pub display_name: String,
    pub from_color: Option<String>,
    pub to_color: String,
    pub created_at: DateTime<Utc>,
    pub out_of_class: Option<bool>,
}

impl From<TapView> for TapViewResponse {
    fn from(tap: TapView) -> Self {
        Self {
            id: tap.id,
            role: tap.role.as_str().to_string(),
            display_name: tap.display_name,
            from_color: tap.from_color.map(|c| c.as_str().to_string()),
            to_color: tap.to_color.as_str().to_string(),
            created_at: tap.created_at,
            out_of_class: tap.out_of_class,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct PostResponse {
    pub id: Uuid,
    pub reply_to: Option<Uuid>,
    pub role: String,
    pub display_name: String,
    pub text: String,
    pub is_mine: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Instructor only: posted outside the active session window.
    pub out_of_class: Option<bool>,
}

impl From<PostView> for PostResponse {
    fn from(post: PostView) -> Self {
        Self {
            id: post.id,
            reply_to: post.reply_to,
            role: post.role.as_str().to_string(),
            display_name: post.display_name,
            text: post.text,
            is_mine: post.is_mine,
            edited_at: post.edited_at,
            created_at: post.created_at,
            out_of_class: post.out_of_class,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ThreadResponse {
    pub root: PostResponse,
    pub replies: Vec<PostResponse>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct QuestionBoardResponse {
    pub course: String,
    pub date_key: String,
    pub can_submit: bool,
    pub threads: Vec<ThreadResponse>,
}

impl QuestionBoardResponse {
    fn new(board: QuestionBoard, can_submit: bool) -> Self {
        Self {
            course: board.day.course,
            date_key: board.day.date_key.to_string(),
            can_submit,
            threads: board
                .threads
                .into_iter()
                .map(|t| ThreadResponse {
                    root: t.root.into(),
                    replies: t.replies.into_iter().map(PostResponse::from).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct PostRequest {
    pub text: String,
    /// The post being answered; absent for a new top-level question.
    pub reply_to: Option<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct EditPostRequest {
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub course: String,
    pub date_key: String,
    pub reply_to: Option<Uuid>,
    pub text: String,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            course: q.day.course,
            date_key: q.day.date_key.to_string(),
            reply_to: q.reply_to,
            text: q.text,
            edited_at: q.edited_at,
            created_at: q.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DeletedResponse {
    /// The deleted post followed by every reply removed with it.
    pub ids: Vec<Uuid>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct WindowResponse {
    pub course: String,
    pub date_key: String,
    /// Minutes after midnight in the reference timezone.
    pub start_minute: Option<u16>,
    pub end_minute: Option<u16>,
    pub active: bool,
}

impl WindowResponse {
    fn new(day: &ClassDay, window: Option<SessionWindow>) -> Self {
        Self {
            course: day.course.clone(),
            date_key: day.date_key.to_string(),
            start_minute: window.as_ref().and_then(|w| w.start_minute),
            end_minute: window.as_ref().and_then(|w| w.end_minute),
            active: window.as_ref().is_some_and(SessionWindow::is_active),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct WindowRequest {
    pub start_minute: Option<u16>,
    pub end_minute: Option<u16>,
}

//=========================================================================================
// Loaders shared with the live subscription
//=========================================================================================

pub async fn load_understanding(
    classroom: &Classroom,
    identity: &AuthIdentity,
    day: &ClassDay,
    hide_names: bool,
) -> PortResult<UnderstandingResponse> {
    let can_submit = classroom.may_submit(identity, day).await?;
    let report = classroom
        .understanding_report(identity, day, hide_names)
        .await?;
    Ok(UnderstandingResponse::new(report, can_submit))
}

pub async fn load_board(
    classroom: &Classroom,
    identity: &AuthIdentity,
    day: &ClassDay,
    hide_names: bool,
) -> PortResult<QuestionBoardResponse> {
    let can_submit = classroom.may_submit(identity, day).await?;
    let board = classroom.question_board(identity, day, hide_names).await?;
    Ok(QuestionBoardResponse::new(board, can_submit))
}

pub async fn load_window(
    classroom: &Classroom,
    identity: &AuthIdentity,
    day: &ClassDay,
) -> PortResult<WindowResponse> {
    let window = classroom.window(identity, day).await?;
    Ok(WindowResponse::new(day, window))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// List the configured courses and their weekly meeting times.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "Configured courses", body = [CourseResponse]))
)]
pub async fn list_courses_handler(State(state): State<Arc<AppState>>) -> Json<Vec<CourseResponse>> {
    let courses = state
        .classroom
        .roster()
        .courses
        .iter()
        .map(|c| CourseResponse {
            id: c.id.clone(),
            label: c.label.clone(),
            term_start: c.schedule.term_start,
            term_end: c.schedule.term_end,
            meetings: c
                .schedule
                .meetings
                .iter()
                .map(|m| MeetingResponse {
                    weekday: m.weekday.to_string(),
                    start_minute: m.start_minute,
                    end_minute: m.end_minute,
                })
                .collect(),
        })
        .collect();
    Json(courses)
}

/// The enrolled students of one course, for the login picker.
#[utoipa::path(
    get,
    path = "/courses/{course}/roster",
    params(("course" = String, Path, description = "Course id, e.g. `ADV 461`.")),
    responses(
        (status = 200, description = "Course roster", body = RosterResponse),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn course_roster_handler(
    State(state): State<Arc<AppState>>,
    Path(course): Path<String>,
) -> Result<Json<RosterResponse>, (StatusCode, String)> {
    let course = state
        .classroom
        .roster()
        .course(&course)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Course {} not found", course)))?;
    Ok(Json(RosterResponse {
        course: course.id.clone(),
        students: course.students.clone(),
    }))
}

/// The current date and time in the reference timezone.
#[utoipa::path(
    get,
    path = "/clock",
    responses((status = 200, description = "Reference clock", body = ClockResponse))
)]
pub async fn clock_handler(State(state): State<Arc<AppState>>) -> Json<ClockResponse> {
    let now = state.classroom.now();
    Json(ClockResponse {
        date_key: now.date_key.to_string(),
        minute_of_day: now.minute_of_day,
        weekday: now.weekday.to_string(),
        timezone: state.classroom.timezone().name().to_string(),
        policy: state.classroom.settings().policy.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/courses/{course}/days/{date}/understanding",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD."),
        ViewQuery
    ),
    responses(
        (status = 200, description = "Understanding report", body = UnderstandingResponse),
        (status = 403, description = "Course belongs to another login")
    )
)]
pub async fn get_understanding_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<UnderstandingResponse>, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let report = load_understanding(&state.classroom, &identity, &day, view.hide_names)
        .await
        .map_err(port_error)?;
    Ok(Json(report))
}

/// Record a red, yellow or green tap for the logged-in person.
#[utoipa::path(
    post,
    path = "/courses/{course}/days/{date}/understanding",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD.")
    ),
    request_body = TapRequest,
    responses(
        (status = 201, description = "Tap recorded", body = TapResponse),
        (status = 400, description = "Unknown color"),
        (status = 403, description = "Submissions are closed")
    )
)]
pub async fn submit_tap_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
    Json(req): Json<TapRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let color = req
        .color
        .parse::<Color>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let event = state
        .classroom
        .submit_tap(&identity, &day, color)
        .await
        .map_err(port_error)?;
    state.feed.publish(&day, ChangeKind::Understanding);

    Ok((
        StatusCode::CREATED,
        Json(TapResponse {
            id: event.id,
            from_color: event.from_color.map(|c| c.as_str().to_string()),
            to_color: event.to_color.as_str().to_string(),
            created_at: event.created_at,
        }),
    ))
}

/// Every tap of the day in order, with in-class flags. Instructor only.
#[utoipa::path(
    get,
    path = "/courses/{course}/days/{date}/understanding/history",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD."),
        ViewQuery
    ),
    responses(
        (status = 200, description = "Tap history", body = [TapViewResponse]),
        (status = 403, description = "Instructor only")
    )
)]
pub async fn understanding_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<Vec<TapViewResponse>>, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let taps = state
        .classroom
        .understanding_history(&identity, &day, view.hide_names)
        .await
        .map_err(port_error)?;
    Ok(Json(taps.into_iter().map(TapViewResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/courses/{course}/days/{date}/questions",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD."),
        ViewQuery
    ),
    responses(
        (status = 200, description = "Threaded questions", body = QuestionBoardResponse),
        (status = 403, description = "Course belongs to another login")
    )
)]
pub async fn get_questions_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<QuestionBoardResponse>, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let board = load_board(&state.classroom, &identity, &day, view.hide_names)
        .await
        .map_err(port_error)?;
    Ok(Json(board))
}

/// Post a question, or a reply when `reply_to` is set.
///
/// Blank text is ignored and answered with 204.
#[utoipa::path(
    post,
    path = "/courses/{course}/days/{date}/questions",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD.")
    ),
    request_body = PostRequest,
    responses(
        (status = 201, description = "Post created", body = QuestionResponse),
        (status = 204, description = "Blank text, nothing stored"),
        (status = 403, description = "Submissions are closed"),
        (status = 404, description = "Parent post not found on this day")
    )
)]
pub async fn submit_post_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
    Json(req): Json<PostRequest>,
) -> Result<Response, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let posted = state
        .classroom
        .submit_post(&identity, &day, &req.text, req.reply_to)
        .await
        .map_err(port_error)?;

    match posted {
        Some(question) => {
            state.feed.publish(&day, ChangeKind::Questions);
            Ok((StatusCode::CREATED, Json(QuestionResponse::from(question))).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Replace the text of one of the caller's own posts.
#[utoipa::path(
    put,
    path = "/questions/{id}",
    params(("id" = Uuid, Path, description = "Post id.")),
    request_body = EditPostRequest,
    responses(
        (status = 200, description = "Post updated", body = QuestionResponse),
        (status = 400, description = "Blank text"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "No such post")
    )
)]
pub async fn edit_post_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<EditPostRequest>,
) -> Result<Json<QuestionResponse>, (StatusCode, String)> {
    let question = state
        .classroom
        .edit_post(&identity, id, &req.text)
        .await
        .map_err(port_error)?;
    state.feed.publish(&question.day, ChangeKind::Questions);
    Ok(Json(question.into()))
}

/// Delete one of the caller's own posts and every reply beneath it.
#[utoipa::path(
    delete,
    path = "/questions/{id}",
    params(("id" = Uuid, Path, description = "Post id.")),
    responses(
        (status = 200, description = "Posts deleted", body = DeletedResponse),
        (status = 403, description = "Not the author"),
        (status = 404, description = "No such post")
    )
)]
pub async fn delete_post_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, (StatusCode, String)> {
    let deleted = state
        .classroom
        .delete_post(&identity, id)
        .await
        .map_err(port_error)?;
    info!(day = %deleted.day, count = deleted.ids.len(), "Posts deleted");
    state.feed.publish(&deleted.day, ChangeKind::Questions);
    Ok(Json(DeletedResponse { ids: deleted.ids }))
}

#[utoipa::path(
    get,
    path = "/courses/{course}/days/{date}/window",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD.")
    ),
    responses((status = 200, description = "Session window", body = WindowResponse))
)]
pub async fn get_window_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
) -> Result<Json<WindowResponse>, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let window = load_window(&state.classroom, &identity, &day)
        .await
        .map_err(port_error)?;
    Ok(Json(window))
}

/// Set or clear the in-class window. Instructor only.
#[utoipa::path(
    put,
    path = "/courses/{course}/days/{date}/window",
    params(
        ("course" = String, Path, description = "Course id."),
        ("date" = String, Path, description = "Class day as YYYY-MM-DD.")
    ),
    request_body = WindowRequest,
    responses(
        (status = 200, description = "Window stored", body = WindowResponse),
        (status = 400, description = "Only one bound given, or a bound past midnight"),
        (status = 403, description = "Instructor only")
    )
)]
pub async fn set_window_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
    Path((course, date)): Path<(String, String)>,
    Json(req): Json<WindowRequest>,
) -> Result<Json<WindowResponse>, (StatusCode, String)> {
    let day = class_day(course, &date)?;
    let window = state
        .classroom
        .set_window(&identity, &day, req.start_minute, req.end_minute)
        .await
        .map_err(port_error)?;
    state.feed.publish(&day, ChangeKind::Window);
    Ok(Json(WindowResponse::new(&day, Some(window))))
}
