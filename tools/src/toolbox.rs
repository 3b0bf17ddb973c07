//! Name-based dispatch over every tool handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use cloud_auth::client::ClientFactory;
use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use log::*;

use crate::gateway::ApiClientFactory;
use crate::handlers::{
    CreateBucketHandler, DownloadObjectHandler, ExtractFrameHandler, GenerateVideoHandler,
    InvokeCodeHandler, InvokeFunctionHandler, TranscribeAudioHandler, Tool, UploadObjectHandler,
};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::ports::CloudClient;
use crate::settings::ToolSettings;

/// Every tool, each with its own client lease, keyed by tool name.
pub struct Toolbox {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
}

impl Toolbox {
    /// A toolbox whose handlers talk to the real service endpoints.
    pub fn new(settings: ToolSettings) -> Result<Self, Error> {
        let factory = ApiClientFactory::from_settings(&settings);
        Self::with_factory(settings, factory)
    }

    /// Each handler gets its own clone of `factory`.
    pub fn with_factory<F>(settings: ToolSettings, factory: F) -> Result<Self, Error>
    where
        F: ClientFactory + Clone + 'static,
        F::Client: CloudClient + 'static,
    {
        let settings = Arc::new(settings);
        let handlers: Vec<Box<dyn Tool>> = vec![
            Box::new(TranscribeAudioHandler::new(settings.clone(), factory.clone())?),
            Box::new(GenerateVideoHandler::new(settings.clone(), factory.clone())),
            Box::new(InvokeCodeHandler::new(settings.clone(), factory.clone())),
            Box::new(InvokeFunctionHandler::new(settings.clone(), factory.clone())),
            Box::new(DownloadObjectHandler::new(settings.clone(), factory.clone())),
            Box::new(UploadObjectHandler::new(settings.clone(), factory.clone())?),
            Box::new(ExtractFrameHandler::new(settings.clone())?),
            Box::new(CreateBucketHandler::new(settings, factory)),
        ];

        Ok(Self {
            tools: handlers
                .into_iter()
                .map(|handler| (handler.name(), handler))
                .collect(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    pub async fn invoke(&mut self, name: &str, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let tool = self.tools.get_mut(name).ok_or_else(|| {
            validation_error(
                ValidationErrorKind::InvalidParameter,
                &format!("unknown tool '{}'", name),
            )
        })?;
        debug!("Invoking {}", name);
        tool.invoke(params).await
    }

    /// Parse `params_json`, invoke `name` and fold any error into a failure
    /// response.
    pub async fn run(&mut self, name: &str, params_json: &str) -> ToolResponse {
        let result = match ToolParameters::from_json(params_json) {
            Ok(params) => self.invoke(name, &params).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                error!("{} failed: {}", name, e);
                ToolResponse::failure(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::services;
    use crate::handlers::test_support::{MockCloud, MockFactory};
    use cloud_jobs::error::ErrorKind;
    use cloud_jobs::types::storage::BucketCreation;

    fn toolbox(factory: MockFactory) -> Toolbox {
        Toolbox::with_factory(ToolSettings::for_endpoint("http://127.0.0.1:9"), factory).unwrap()
    }

    #[test]
    fn test_registers_every_tool() {
        let toolbox = toolbox(MockFactory::idle());

        assert_eq!(
            toolbox.names().collect::<Vec<_>>(),
            vec![
                "create_bucket",
                "download_object",
                "extract_frame",
                "generate_video",
                "invoke_code",
                "invoke_function",
                "transcribe_audio",
                "upload_object",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let mut toolbox = toolbox(MockFactory::idle());

        let err = toolbox
            .invoke("delete_everything", &ToolParameters::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Validation(ValidationErrorKind::InvalidParameter)
        );
    }

    #[tokio::test]
    async fn test_run_reports_failures_as_responses() {
        let mut toolbox = toolbox(MockFactory::idle());

        let bad_json = toolbox.run("create_bucket", "{not json").await;
        assert!(bad_json.is_error);

        let missing = toolbox.run("create_bucket", "{}").await;
        assert!(missing.is_error);
        assert!(missing.text_content().contains("bucket_name"));
    }

    #[tokio::test]
    async fn test_run_dispatches_by_name() {
        let factory = MockFactory::new(|service, _| {
            let mut cloud = MockCloud::new();
            if service == services::S3 {
                cloud
                    .expect_create_bucket()
                    .times(1)
                    .returning(|_| Ok(BucketCreation::Created { location: None }));
            }
            cloud
        });
        let mut toolbox = toolbox(factory.clone());

        let response = toolbox
            .run("create_bucket", r#"{"bucket_name": "media"}"#)
            .await;

        assert!(!response.is_error);
        assert_eq!(
            response.text_content(),
            "Bucket 'media' created in us-east-1. Location: /media"
        );
        assert_eq!(factory.created(), 1);
    }
}
