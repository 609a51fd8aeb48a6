use async_trait::async_trait;
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use super::archive::build_context_archive;
use super::{log_build_output, BuildEngine, EngineError, ImageCache};
use crate::orchestrator::BuildTarget;

/// Engine backed by the Docker Engine API on the local socket
pub struct DockerApiEngine {
    docker: Docker,
    context: PathBuf,
}

impl DockerApiEngine {
    /// Connects with the local defaults (`DOCKER_HOST` or the unix socket).
    /// No request is sent until the engine is used.
    pub fn connect(context: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            context: context.into(),
        })
    }

}

#[async_trait]
impl BuildEngine for DockerApiEngine {
    async fn check_available(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        match self.docker.version().await {
            Ok(v) => {
                let api_version = v.api_version.unwrap_or_else(|| "unknown".to_string());
                debug!("Docker API version: {}", api_version);
            }
            Err(e) => debug!("Failed to get Docker version: {}", e),
        }
        Ok(())
    }

    async fn build(&self, config_file: &Path, target: &BuildTarget) -> Result<(), EngineError> {
        let context = self.context.clone();
        let dockerfile = config_file.to_path_buf();
        let archive =
            tokio::task::spawn_blocking(move || build_context_archive(&context, &dockerfile))
                .await
                .map_err(|e| EngineError::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        debug!(
            dockerfile = %archive.dockerfile,
            entries = archive.entries,
            bytes = archive.bytes.len(),
            "Sending build context"
        );

        let options = BuildImageOptions {
            dockerfile: archive.dockerfile.clone(),
            t: target.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let file = config_file.display().to_string();
        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(archive.bytes)));

        // Drain the stream fully so the daemon-side build is finished
        // before the next attempt can start.
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(message) = info.error {
                        return Err(EngineError::BuildFailed {
                            file,
                            message: message.trim().to_string(),
                        });
                    }
                    if let Some(output) = info.stream {
                        log_build_output(&output);
                    }
                }
                Err(e) => {
                    return Err(EngineError::BuildFailed {
                        file,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(image = %target, dockerfile = %file, "Image built");
        Ok(())
    }

    fn name(&self) -> &str {
        "docker-api"
    }
}

#[async_trait]
impl ImageCache for DockerApiEngine {
    async fn prefetch_base(&self, image_ref: &str) -> Result<(), EngineError> {
        let (from_image, tag) = split_image_ref(image_ref);
        let options = CreateImageOptions {
            from_image: from_image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(status) = info.status {
                        trace!(image = image_ref, "{}", status);
                    }
                }
                Err(e) => {
                    return Err(EngineError::PrefetchFailed {
                        image: image_ref.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Splits `name[:tag]` into name and tag, defaulting the tag to `latest`.
/// A colon belonging to a registry port (`host:5000/img`) is not a tag
/// separator. Digest references are passed through whole with no tag.
pub fn split_image_ref(image_ref: &str) -> (&str, &str) {
    if image_ref.contains('@') {
        return (image_ref, "");
    }
    match image_ref.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image_ref, "latest"),
    }
}
