use std::{fmt::Display, time::Duration};

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use ds_utils::api::{check_response, ApiConfig, ApiError, WithAuth};
use futures::{Stream, StreamExt};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
	error::Error,
	pair::DocumentSource,
	relay::{FeedStream, ListenQuery, MutationFeed},
	sse::SseDecoder,
	types::{Document, FeedEvent, MutationEvent},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DOCUMENT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Talks to the data endpoints of one dataset: the listen feed and batched document reads
#[derive(Debug, Clone)]
pub struct HttpDatasetClient {
	client: Client,
	config: ApiConfig,
}

impl HttpDatasetClient {
	pub fn new(config: ApiConfig) -> Result<Self, Error> {
		let client = ds_utils::http_client_builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.build()
			.map_err(ApiError::from)?;

		Ok(Self::with_client(client, config))
	}

	pub const fn with_client(client: Client, config: ApiConfig) -> Self {
		Self { client, config }
	}

	pub const fn config(&self) -> &ApiConfig {
		&self.config
	}
}

#[async_trait]
impl MutationFeed for HttpDatasetClient {
	async fn listen(&self, query: ListenQuery) -> Result<FeedStream, Error> {
		let url = self
			.config
			.project_url(&format!("data/listen/{}", self.config.dataset));

		debug!(%url, tag = %query.tag, "Opening listener connection");

		let response = self
			.client
			.get(url)
			.query(&query.to_params())
			.header(header::ACCEPT, "text/event-stream")
			.with_optional_auth(self.config.token.as_deref())
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;

		let response = check_response(response).await?;

		Ok(decode_feed(response.bytes_stream()))
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WelcomePayload {
	listener_name: Option<String>,
}

#[derive(Deserialize)]
struct ChannelErrorPayload {
	message: Option<String>,
}

/// Turns the raw event-stream body into feed events.
///
/// `disconnect` ends the stream cleanly, `channelError` ends it with [`Error::Channel`].
pub fn decode_feed<S, E>(body: S) -> FeedStream
where
	S: Stream<Item = Result<Bytes, E>> + Send + 'static,
	E: Display + Send + 'static,
{
	try_stream! {
		let mut body = Box::pin(body);
		let mut decoder = SseDecoder::new();

		'feed: while let Some(chunk) = body.next().await {
			let chunk = chunk.map_err(|e| Error::Transport(e.to_string()))?;

			for message in decoder.feed(&chunk) {
				match message.event.as_str() {
					"welcome" => {
						let listener_name = serde_json::from_str::<WelcomePayload>(&message.data)
							.ok()
							.and_then(|payload| payload.listener_name);

						yield FeedEvent::Welcome { listener_name };
					}
					"mutation" => {
						let mutation = serde_json::from_str::<MutationEvent>(&message.data)?;
						yield FeedEvent::Mutation(mutation);
					}
					"reconnect" => {
						yield FeedEvent::Reconnect;
					}
					"channelError" => {
						let reason = serde_json::from_str::<ChannelErrorPayload>(&message.data)
							.ok()
							.and_then(|payload| payload.message)
							.unwrap_or(message.data);

						Err::<(), _>(Error::Channel(reason))?;
					}
					"disconnect" => {
						debug!("Server closed the listener connection");
						break 'feed;
					}
					other => trace!(event = other, "Ignoring unknown listener event"),
				}
			}
		}
	}
	.boxed()
}

#[derive(Deserialize)]
struct DocumentsResponse {
	#[serde(default)]
	documents: Vec<Document>,
}

#[async_trait]
impl DocumentSource for HttpDatasetClient {
	async fn get_documents(&self, ids: &[&str], tag: &str) -> Result<Vec<Option<Document>>, Error> {
		let url = self.config.project_url(&format!(
			"data/doc/{}/{}",
			self.config.dataset,
			ids.join(",")
		));

		let response = self
			.client
			.get(url)
			.query(&[("tag", tag)])
			.timeout(DOCUMENT_FETCH_TIMEOUT)
			.with_optional_auth(self.config.token.as_deref())
			.send()
			.await
			.map_err(ApiError::from)?;

		let DocumentsResponse { documents } = check_response(response)
			.await?
			.json()
			.await
			.map_err(ApiError::from)?;

		Ok(order_documents(ids, documents))
	}
}

/// The endpoint only returns documents that exist, in no particular order
pub fn order_documents(ids: &[&str], mut documents: Vec<Document>) -> Vec<Option<Document>> {
	ids.iter()
		.map(|id| {
			documents
				.iter()
				.position(|doc| doc.id == *id)
				.map(|index| documents.swap_remove(index))
		})
		.collect()
}
