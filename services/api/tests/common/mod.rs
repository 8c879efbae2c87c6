//! Shared harness: the real router on an ephemeral port, backed by the
//! in-process store and the shipped roster.

#![allow(dead_code)]

use api_lib::adapters::parse_roster;
use api_lib::config::Config;
use api_lib::web::{router, state::AppState};
use classroom_core::{InMemoryStore, SubmissionPolicy};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub const COURSE: &str = "ADV 375-01";
pub const COURSE_PATH: &str = "ADV%20375-01";
pub const OTHER_COURSE: &str = "ADV 461";
pub const PAST_DAY: &str = "2026-02-03";

pub const AVIV: &str = "Aviv, Andie";
pub const CHAN: &str = "Chan, Natalie";

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
}

pub async fn spawn_app(policy: SubmissionPolicy) -> TestApp {
    spawn_app_with(|config| config.submission_policy = policy).await
}

/// Like `spawn_app`, with a chance to adjust the config first.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "memory".to_string(),
        log_level: tracing::Level::WARN,
        app_id: "classroom-pulse-test".to_string(),
        reference_tz: chrono_tz::America::Los_Angeles,
        roster_path: PathBuf::from("roster.json"),
        submission_policy: SubmissionPolicy::Anytime,
        instructor_label: "Professor".to_string(),
        question_max_chars: 1200,
        auth_session_days: 30,
        admin_static_pin: None,
        cors_origin: "http://localhost:3000".to_string(),
    };
    configure(&mut config);
    let roster = parse_roster(include_str!("../../roster.json")).unwrap();
    let state = Arc::new(AppState::from_config(
        Arc::new(config),
        Arc::new(InMemoryStore::new()),
        roster,
    ));
    let app = router(state).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn day_url(&self, course_path: &str, date: &str, tail: &str) -> String {
        self.url(&format!("/courses/{}/days/{}/{}", course_path, date, tail))
    }

    /// Registers a PIN and returns the `session=...` cookie pair.
    pub async fn register(&self, scope: &str, name: &str, pin: &str) -> String {
        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "scope": scope, "name": name, "pin": pin, "pin_confirm": pin }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "register {} failed", name);
        session_cookie(&resp)
    }

    pub async fn register_admin(&self) -> String {
        self.register("ADMIN", "Administrator", "9999").await
    }

    pub async fn get(&self, url: &str, cookie: &str) -> reqwest::Response {
        self.client
            .get(url)
            .header(COOKIE, cookie)
            .send()
            .await
            .unwrap()
    }

    pub async fn get_json(&self, url: &str, cookie: &str) -> Value {
        let resp = self.get(url, cookie).await;
        assert_eq!(resp.status(), 200, "GET {}", url);
        resp.json().await.unwrap()
    }

    pub async fn post(&self, url: &str, cookie: &str, body: Value) -> reqwest::Response {
        self.client
            .post(url)
            .header(COOKIE, cookie)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, url: &str, cookie: &str, body: Value) -> reqwest::Response {
        self.client
            .put(url)
            .header(COOKIE, cookie)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, url: &str, cookie: &str) -> reqwest::Response {
        self.client
            .delete(url)
            .header(COOKIE, cookie)
            .send()
            .await
            .unwrap()
    }
}

pub fn session_cookie(resp: &reqwest::Response) -> String {
    let header = resp
        .headers()
        .get(SET_COOKIE)
        .expect("response sets a cookie")
        .to_str()
        .unwrap();
    header.split(';').next().unwrap().to_string()
}
