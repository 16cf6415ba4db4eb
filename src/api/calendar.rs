use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use super::{PathParam, SharedState};
use crate::calendar;
use crate::errors::Result;

/// Public iCalendar feed of an employee's open tasks. The token in the
/// path is the only credential.
pub async fn feed(
    State(state): State<SharedState>,
    PathParam(token): PathParam<String>,
) -> Result<impl IntoResponse> {
    let (employee, entries) = state
        .db
        .call(move |db| {
            let employee = db.employee_by_calendar_token(&token)?;
            let entries = db.calendar_tasks(employee.id)?;
            Ok((employee, entries))
        })
        .await?;

    tracing::debug!(
        employee_id = employee.id,
        events = entries.len(),
        "calendar feed served"
    );
    let body = calendar::render_feed(&employee.name, &entries, state.clock.now());
    Ok((
        [
            (header::CONTENT_TYPE, calendar::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::api::test_support::*;

    #[tokio::test]
    async fn test_feed_lists_open_assigned_tasks() {
        let app = test_app();
        let token = app.login_as("feed@example.com").await;
        let response = app.send("GET", "/api/employees/me", Some(&token), None).await;
        let me: Value = body_json(response.into_body()).await;

        let response = app
            .send(
                "POST",
                &format!("/api/employees/{}/calendar-token", me["id"]),
                Some(&token),
                None,
            )
            .await;
        let issued: Value = body_json(response.into_body()).await;
        let feed_path = issued["feed_path"].as_str().unwrap().to_string();

        let project_id = app.create_project(&token, "Feed project").await;
        app.create_task(
            &token,
            json!({
                "project_id": project_id,
                "employee_id": me["id"],
                "title": "Inspect roof",
                "due_date": now() + Duration::days(2),
            }),
        )
        .await;
        let finished = app
            .create_task(
                &token,
                json!({
                    "project_id": project_id,
                    "employee_id": me["id"],
                    "title": "Order scaffolding",
                    "due_date": now() + Duration::days(1),
                }),
            )
            .await;
        app.send(
            "PATCH",
            &format!("/api/tasks/{}/status", finished["id"]),
            Some(&token),
            Some(json!({"status": "done"})),
        )
        .await;

        // No bearer token needed.
        let response = app.send("GET", &feed_path, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/calendar; charset=utf-8"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("SUMMARY:[Feed project] Inspect roof\r\n"));
        assert!(!body.contains("Order scaffolding"));
        assert!(body.contains("DTSTART;VALUE=DATE:20260403\r\n"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let app = test_app();
        let response = app
            .send("GET", "/api/calendar/does-not-exist/feed.ics", None, None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
