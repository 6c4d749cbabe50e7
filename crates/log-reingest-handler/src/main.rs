// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use tokio::io::AsyncReadExt;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use log_reingest::{
    config::{ForwardConfig, PipelineConfig, TransformConfig},
    constants::DEFAULT_LOG_LEVEL,
    forward::ForwardStage,
    invocation::{FirehoseTransformationEvent, S3Notification},
    logger::Formatter,
    pipeline::ReingestPipeline,
    sinks::FsFallbackSink,
    sources::FsSourceReader,
    transformation::TransformationStage,
    transport::HttpTransport,
};

const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let log_level = env::var("REINGEST_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    init_logging(&log_level)?;

    let mode = env::var("REINGEST_MODE").unwrap_or_else(|_| "reingest".to_string());
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read invocation event from stdin")?;
    debug!("Read {} bytes of invocation event", input.len());

    let result = match mode.as_str() {
        "reingest" => reingest(&input).await,
        "transform" => transform(&input).await,
        "forward" => forward(&input).await,
        other => {
            bail!("Unknown REINGEST_MODE '{other}'. Must be one of: reingest, transform, forward")
        }
    };

    match result {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            error!("Invocation failed: {e:#}");
            Err(e)
        }
    }
}

fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{log_level}");
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).context("could not parse log level in configuration")?,
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .event_format(Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set up logging")?;
    Ok(())
}

fn transport_from_env() -> anyhow::Result<Arc<HttpTransport>> {
    let url = env::var("REINGEST_TRANSPORT_URL")
        .context("REINGEST_TRANSPORT_URL environment variable not set")?;
    Ok(Arc::new(HttpTransport::new(url, TRANSPORT_TIMEOUT)?))
}

fn source_from_env() -> Arc<FsSourceReader> {
    let root = env::var("REINGEST_SOURCE_ROOT").unwrap_or_else(|_| ".".to_string());
    Arc::new(FsSourceReader::new(root))
}

async fn reingest(input: &str) -> anyhow::Result<String> {
    let config = Arc::new(PipelineConfig::from_env()?);
    let notification: S3Notification =
        serde_json::from_str(input).context("invalid object notification")?;
    let location = notification.object_location()?;

    let fallback_root = env::var("REINGEST_FALLBACK_ROOT").unwrap_or_else(|_| ".".to_string());
    let pipeline = ReingestPipeline::new(
        config,
        transport_from_env()?,
        source_from_env(),
        Arc::new(FsFallbackSink::new(fallback_root)),
    )?;

    let summary = pipeline.run(&location).await?;
    Ok(serde_json::to_string(&summary)?)
}

async fn transform(input: &str) -> anyhow::Result<String> {
    let config = Arc::new(TransformConfig::from_env()?);
    let event: FirehoseTransformationEvent =
        serde_json::from_str(input).context("invalid transformation event")?;

    let stage = TransformationStage::new(config, transport_from_env()?)?;
    let response = stage.handle(event).await?;
    Ok(serde_json::to_string(&response)?)
}

async fn forward(input: &str) -> anyhow::Result<String> {
    let config = Arc::new(ForwardConfig::from_env()?);
    let notification: S3Notification =
        serde_json::from_str(input).context("invalid object notification")?;
    let location = notification.object_location()?;

    let stage = ForwardStage::new(config, transport_from_env()?, source_from_env())?;
    let summary = stage.forward(&location).await?;
    Ok(serde_json::to_string(&summary)?)
}
