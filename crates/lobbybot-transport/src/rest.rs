//! REST client for the catalog and chat API using `reqwest`.

use std::sync::Arc;

use lobbybot_protocol::{
    Beatmap, BeatmapId, ChannelId, ChatMessage, NewRoom, Room, User, UserId,
};
use reqwest::{header, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ApiError, Catalog, Chat};

const USER_AGENT: &str = "lobbybot";

/// Response body of the attributes endpoint.
#[derive(Deserialize)]
struct AttributesResponse {
    attributes: Attributes,
}

#[derive(Deserialize)]
struct Attributes {
    star_rating: f64,
}

/// A [`Catalog`] and [`Chat`] implementation talking to the v2 REST API.
///
/// Cheap to clone; `reqwest::Client` pools connections internally.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: Arc<str>,
    token: Arc<str>,
}

impl RestClient {
    /// Builds a client for `base_url` (e.g. `https://osu.ppy.sh`) that
    /// authenticates every request with the bearer `token`.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Request)?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: Arc::from(token),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/v2/{}", self.base_url, path);
        self.client
            .request(method, url)
            .bearer_auth(self.token.as_ref())
            .header(header::ACCEPT, "application/json")
    }

    /// Sends the request and decodes the body.
    ///
    /// The API reports failures as `{ "error": "..." }`, sometimes with a
    /// 2xx status, so the body is checked before the status.
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(ApiError::Request)?;
        let status = response.status();
        let body: Value = response.json().await.map_err(ApiError::Request)?;

        if let Some(reason) = body.get("error").and_then(Value::as_str) {
            return Err(ApiError::Remote(reason.to_string()));
        }
        if !status.is_success() {
            return Err(ApiError::Remote(format!("http status {status}")));
        }

        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl Catalog for RestClient {
    async fn lookup_beatmap(&self, id: BeatmapId) -> Result<Beatmap, ApiError> {
        let builder = self
            .request(Method::GET, "beatmaps/lookup")
            .query(&[("id", id.0)]);
        self.execute(builder).await
    }

    async fn beatmap_attributes(
        &self,
        id: BeatmapId,
        ruleset: &str,
    ) -> Result<f64, ApiError> {
        let builder = self
            .request(Method::POST, &format!("beatmaps/{}/attributes", id.0))
            .json(&json!({ "ruleset": ruleset }));
        let response: AttributesResponse = self.execute(builder).await?;
        Ok(response.attributes.star_rating)
    }

    async fn lookup_user(&self, id: UserId) -> Result<User, ApiError> {
        let builder = self.request(Method::GET, &format!("users/{}", id.0));
        self.execute(builder).await
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.execute(self.request(Method::GET, "me")).await
    }

    async fn create_room(&self, room: &NewRoom) -> Result<Room, ApiError> {
        let builder = self.request(Method::POST, "rooms").json(&json!({
            "name": room.name,
            "password": room.password,
            "queue_mode": room.queue_mode,
            "auto_skip": room.auto_skip,
            "playlist": room.playlist,
            "type": "head_to_head",
            "category": "normal",
        }));
        self.execute(builder).await
    }
}

impl Chat for RestClient {
    async fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
        is_action: bool,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &format!("chat/channels/{}/messages", channel.0))
            .json(&json!({ "message": text, "is_action": is_action }));
        let _: Value = self.execute(builder).await?;
        Ok(())
    }

    async fn poll_messages(
        &self,
        channel: ChannelId,
        since: u64,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let builder = self
            .request(Method::GET, &format!("chat/channels/{}/messages", channel.0))
            .query(&[("since", since)]);
        self.execute(builder).await
    }
}
