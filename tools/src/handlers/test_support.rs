use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cloud_auth::client::ClientFactory;
use cloud_auth::credentials::CredentialRecord;
use cloud_jobs::error::Error;
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::types::storage::{BucketCreation, CreateBucket, PutObject, StoredObject};
use mockall::mock;
use serde_json::Value;

use crate::ports::code_interpreter::{CodeInterpreterApi, CreateCodeInterpreter};
use crate::ports::function::{FunctionApi, FunctionResponse, InvokeFunction};
use crate::ports::transcription::{StartTranscription, TranscriptionApi, TranscriptionJob};
use crate::ports::video::{AsyncInvocation, StartAsyncInvoke, VideoGenerationApi};
use crate::settings::ToolSettings;

mock! {
    pub Cloud {}

    #[async_trait]
    impl TranscriptionApi for Cloud {
        async fn start_transcription_job(&self, request: StartTranscription) -> Result<(), Error>;
        async fn get_transcription_job(&self, job_name: &str) -> Result<TranscriptionJob, Error>;
    }

    #[async_trait]
    impl VideoGenerationApi for Cloud {
        async fn start_async_invoke(&self, request: StartAsyncInvoke) -> Result<String, Error>;
        async fn get_async_invoke(&self, invocation_arn: &str) -> Result<AsyncInvocation, Error>;
    }

    #[async_trait]
    impl FunctionApi for Cloud {
        async fn invoke_function(&self, request: InvokeFunction) -> Result<FunctionResponse, Error>;
    }

    #[async_trait]
    impl CodeInterpreterApi for Cloud {
        async fn create_code_interpreter(&self, request: CreateCodeInterpreter) -> Result<String, Error>;
        async fn start_session(&self, code_interpreter_id: &str, timeout_secs: u64) -> Result<String, Error>;
        async fn invoke_tool(
            &self,
            code_interpreter_id: &str,
            session_id: &str,
            tool_name: &str,
            arguments: Value,
        ) -> Result<Value, Error>;
    }

    #[async_trait]
    impl ObjectStore for Cloud {
        async fn put_object(&self, request: PutObject) -> Result<(), Error>;
        async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, Error>;
        async fn create_bucket(&self, request: CreateBucket) -> Result<BucketCreation, Error>;
    }
}

type Builder = dyn Fn(&str, &CredentialRecord) -> MockCloud + Send + Sync;

/// Hands out a freshly configured mock per `create` call and counts them.
#[derive(Clone)]
pub struct MockFactory {
    builder: Arc<Builder>,
    created: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new(builder: impl Fn(&str, &CredentialRecord) -> MockCloud + Send + Sync + 'static) -> Self {
        Self {
            builder: Arc::new(builder),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every service gets a mock without expectations.
    pub fn idle() -> Self {
        Self::new(|_, _| MockCloud::new())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockFactory {
    type Client = MockCloud;

    fn create(&self, service: &str, credentials: &CredentialRecord) -> Result<MockCloud, cloud_auth::Error> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok((self.builder)(service, credentials))
    }
}

pub fn settings() -> Arc<ToolSettings> {
    Arc::new(ToolSettings::for_endpoint("http://127.0.0.1:9"))
}
