use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use ds_listener::{HttpDatasetClient, IdPair, ListenerConfig, PairListener};
use futures::StreamExt;
use tracing::info;

use crate::context::Context;

#[derive(Args, Debug)]
pub struct ListenArgs {
	/// Document to follow, either its draft or published id
	pub document_id: String,
	/// Dataset the document lives in
	#[arg(value_name = "DATASET")]
	pub dataset_name: Option<String>,
	/// Request tag sent along with the subscription
	#[arg(long)]
	pub tag: Option<String>,
}

/// Prints every event of the pair as a JSON line until interrupted
pub async fn run(ctx: &Context, args: ListenArgs) -> Result<()> {
	let dataset = ctx.resolve_dataset(args.dataset_name)?;
	let client = Arc::new(HttpDatasetClient::new(ctx.api_config(dataset)?)?);

	let pair = IdPair::from_id(&args.document_id);
	info!(
		published_id = %pair.published_id,
		draft_id = %pair.draft_id,
		"Listening to document pair"
	);

	let listener = PairListener::new(Arc::clone(&client), client, ListenerConfig::default());
	let mut events = listener.listen(pair, args.tag.as_deref());

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("Interrupted, closing the subscription");
				break;
			}
			event = events.next() => match event {
				Some(event) => {
					let event = event.context("listening to document pair")?;
					println!("{}", serde_json::to_string(&event)?);
				}
				None => break,
			},
		}
	}

	Ok(())
}
