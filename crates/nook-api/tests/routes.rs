use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use nook_api::state::AppStateInner;
use nook_db::Database;
use nook_gateway::store::SessionStore;
use nook_gateway::{Connection, Relay, RelayConfig};
use nook_types::api::Claims;
use nook_types::events::{GatewayCommand, GatewayEvent};

const SECRET: &str = "test-secret";

struct Harness {
    app: Router,
    relay: Relay,
    db: Arc<Database>,
    club: Uuid,
    general: Uuid,
    owner: Uuid,
}

fn harness() -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let club = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let general = Uuid::new_v4();
    db.upsert_user(&owner.to_string(), "Ada").unwrap();
    db.insert_club(&club.to_string(), "Night Owls", &owner.to_string(), false)
        .unwrap();
    db.insert_room(&general.to_string(), &club.to_string(), "general", "default")
        .unwrap();

    let relay = Relay::with_database(db.clone(), RelayConfig::default());
    let app = nook_api::router(Arc::new(AppStateInner {
        relay: relay.clone(),
        jwt_secret: SECRET.into(),
    }));
    Harness {
        app,
        relay,
        db,
        club,
        general,
        owner,
    }
}

fn token_for(user_id: Uuid, username: &str) -> String {
    let claims = Claims {
        sub: user_id,
        username: username.into(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, user_id: Uuid, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id, "tester")));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Join the harness club over an in-process connection and post one message.
async fn posted_message(h: &Harness) -> (Connection, tokio::sync::mpsc::UnboundedReceiver<nook_gateway::registry::Outbound>, Uuid) {
    let (mut conn, mut rx) = Connection::new(h.owner);
    h.relay
        .handle(
            &mut conn,
            GatewayCommand::Join {
                club_id: h.club,
                user_id: h.owner,
                display_name: "Ada".into(),
                room_id: None,
            },
        )
        .await;
    h.relay
        .handle(
            &mut conn,
            GatewayCommand::ChatMessage {
                message: Some("Who else cried at the ending?".into()),
                attachments: vec![],
                reply_to_id: None,
            },
        )
        .await;
    let message_id = h.db.list_recent_messages(h.general, 10).unwrap()[0].id;
    while rx.try_recv().is_ok() {}
    (conn, rx, message_id)
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let h = harness();
    let uri = format!("/dms/{}", Uuid::new_v4());

    let req = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, _) = call(&h.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&h.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rest_delete_is_mirrored_to_the_room() {
    let h = harness();
    let (_conn, mut rx, message_id) = posted_message(&h).await;

    let (status, body) = call(
        &h.app,
        request("DELETE", &format!("/messages/{}", message_id), h.owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "[Message deleted]");
    assert_eq!(body["is_pinned"], false);

    match rx.try_recv().unwrap() {
        nook_gateway::registry::Outbound::Event(GatewayEvent::MessageUpdated { message }) => {
            assert_eq!(message.id, message_id);
            assert!(message.is_deleted());
        }
        other => panic!("unexpected outbound {:?}", other),
    }
}

#[tokio::test]
async fn unknown_message_is_not_found() {
    let h = harness();
    let (status, _) = call(
        &h.app,
        request("DELETE", &format!("/messages/{}", Uuid::new_v4()), h.owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pin_requires_a_moderator() {
    let h = harness();
    let (_conn, _rx, message_id) = posted_message(&h).await;
    let uri = format!("/messages/{}/pin", message_id);

    let (status, _) = call(&h.app, request("POST", &uri, Uuid::new_v4(), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&h.app, request("POST", &uri, h.owner, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_pinned"], true);

    let (status, body) = call(&h.app, request("DELETE", &uri, h.owner, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_pinned"], false);
}

#[tokio::test]
async fn pinning_a_deleted_message_conflicts() {
    let h = harness();
    let (_conn, _rx, message_id) = posted_message(&h).await;
    h.relay.delete_message(h.owner, message_id).await.unwrap();

    let (status, _) = call(
        &h.app,
        request("POST", &format!("/messages/{}/pin", message_id), h.owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn edit_updates_content() {
    let h = harness();
    let (_conn, _rx, message_id) = posted_message(&h).await;

    let (status, body) = call(
        &h.app,
        request(
            "PATCH",
            &format!("/messages/{}", message_id),
            h.owner,
            Some(json!({ "content": "Who else cried at the epilogue?" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Who else cried at the epilogue?");
    assert!(!body["edited_at"].is_null());
}

#[tokio::test]
async fn reaction_toggle_flips_state() {
    let h = harness();
    let (_conn, _rx, message_id) = posted_message(&h).await;
    let uri = format!("/messages/{}/reactions", message_id);

    let (status, body) = call(&h.app, request("POST", &uri, h.owner, Some(json!({ "emoji": "😭" })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], true);

    let (_, body) = call(&h.app, request("POST", &uri, h.owner, Some(json!({ "emoji": "😭" })))).await;
    assert_eq!(body["added"], false);
}

#[tokio::test]
async fn reaction_put_and_delete_return_reaction_set() {
    let h = harness();
    let (_conn, _rx, message_id) = posted_message(&h).await;
    let uri = format!("/messages/{}/reactions/%F0%9F%94%A5", message_id);

    let (status, body) = call(&h.app, request("PUT", &uri, h.owner, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["emoji"], "🔥");
    assert_eq!(body[0]["count"], 1);

    let (status, body) = call(&h.app, request("DELETE", &uri, h.owner, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn room_lifecycle_over_rest() {
    let h = harness();
    let uri = format!("/clubs/{}/rooms", h.club);

    let (status, room) = call(
        &h.app,
        request("POST", &uri, h.owner, Some(json!({ "name": "book-2" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(room["room_type"], "public");

    let (status, _) = call(
        &h.app,
        request("POST", &uri, Uuid::new_v4(), Some(json!({ "name": "mine" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let room_id = room["id"].as_str().unwrap();
    let (status, _) = call(
        &h.app,
        request("DELETE", &format!("{}/{}", uri, room_id), h.owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &h.app,
        request("DELETE", &format!("{}/{}", uri, h.general), h.owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(h.db.get_rooms(&h.club.to_string()).unwrap().len(), 1);
}

#[tokio::test]
async fn dm_history_is_scoped_to_the_caller() {
    let h = harness();
    let friend = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let (mut conn, _rx) = Connection::new(h.owner);
    h.relay
        .handle(
            &mut conn,
            GatewayCommand::JoinDm {
                user_id: h.owner,
                display_name: "Ada".into(),
            },
        )
        .await;
    for text in ["finished?", "not yet"] {
        h.relay
            .handle(
                &mut conn,
                GatewayCommand::DmMessage {
                    receiver_id: friend,
                    content: text.into(),
                    attachments: vec![],
                },
            )
            .await;
    }

    let (status, body) = call(&h.app, request("GET", &format!("/dms/{}", h.owner), friend, None)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "finished?");

    let (_, body) = call(&h.app, request("GET", &format!("/dms/{}?limit=1", h.owner), friend, None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = call(&h.app, request("GET", &format!("/dms/{}", h.owner), stranger, None)).await;
    assert_eq!(body, json!([]));
}
