//! The local LLM client
//!
//! [`Llm`] holds the configuration and owns two expensive collaborators, the
//! inference engine and the ingester. Each is built the first time an
//! operation needs it and reused afterwards. The model file itself is
//! fetched eagerly when the client is constructed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use common::error::{Error, Result};
use inference_engine::{EngineConfig, EngineLoader, InferenceEngine, PromptTemplate, TokenCallback};
use model_manager::{FetchOptions, FetchOutcome, ModelFetcher, ModelReference};
use retrieval::{Answer, Ingester, IngesterFactory, StuffPrompt};
use settings::{EmbeddingSettings, EngineSettings, GenerationSettings, ModelSettings, Settings};

/// Configuration of an [`Llm`], fixed at construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmOptions {
    pub model: ModelSettings,
    pub generation: GenerationSettings,
    pub embedding: EmbeddingSettings,
    pub engine: EngineSettings,
}

impl From<&Settings> for LlmOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.model.clone(),
            generation: settings.generation.clone(),
            embedding: settings.embedding.clone(),
            engine: settings.engine.clone(),
        }
    }
}

impl LlmOptions {
    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            override_dir: self.model.download_path.clone(),
            interactive: self.model.confirm,
            verify_tls: self.model.verify_tls,
        }
    }
}

/// Engine loader used when none is supplied
#[cfg(feature = "llama")]
fn default_engine_loader(_engine: &EngineSettings) -> Arc<dyn EngineLoader> {
    Arc::new(inference_engine::LlamaEngineLoader)
}

/// Engine loader used when none is supplied
#[cfg(not(feature = "llama"))]
fn default_engine_loader(engine: &EngineSettings) -> Arc<dyn EngineLoader> {
    Arc::new(inference_engine::CommandEngineLoader::from_settings(engine))
}

/// Builder for [`Llm`]
pub struct LlmBuilder {
    options: LlmOptions,
    fetcher: Option<ModelFetcher>,
    engine_loader: Option<Arc<dyn EngineLoader>>,
    ingester_factory: Option<Arc<dyn IngesterFactory>>,
    token_callback: Option<Option<TokenCallback>>,
    qa_prompt: StuffPrompt,
}

impl LlmBuilder {
    /// Creates a builder with default collaborators
    pub fn new(options: LlmOptions) -> Self {
        Self {
            options,
            fetcher: None,
            engine_loader: None,
            ingester_factory: None,
            token_callback: None,
            qa_prompt: StuffPrompt::default(),
        }
    }

    /// Fetcher used when the model file is missing at construction
    pub fn fetcher(mut self, fetcher: ModelFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the factory used to build the inference engine
    pub fn engine_loader(mut self, loader: Arc<dyn EngineLoader>) -> Self {
        self.engine_loader = Some(loader);
        self
    }

    /// Sets the factory used to build the ingester
    pub fn ingester_factory(mut self, factory: Arc<dyn IngesterFactory>) -> Self {
        self.ingester_factory = Some(factory);
        self
    }

    /// Replaces the stdout token stream; `None` mutes streaming
    pub fn token_callback(mut self, callback: Option<TokenCallback>) -> Self {
        self.token_callback = Some(callback);
        self
    }

    /// Sets the template used to answer questions
    pub fn qa_prompt(mut self, prompt: StuffPrompt) -> Self {
        self.qa_prompt = prompt;
        self
    }

    /// Resolves the model and fetches it if it is not on disk yet
    ///
    /// A declined download is not an error here; operations that need the
    /// model fail later with [`Error::ModelNotDownloaded`].
    pub async fn build(self) -> Result<Llm> {
        let options = self.options;
        let reference = ModelReference::new(options.model.effective_url())?;
        if options.generation.verbose && options.model.use_larger {
            info!("Since use_larger is set, using {}", reference.file_name());
        }

        let path = reference.resolve_path(options.model.download_path.as_deref())?;
        if !path.is_file() {
            let fetcher = self.fetcher.unwrap_or_default();
            let outcome = fetcher
                .ensure_downloaded(&reference, &options.fetch_options())
                .await?;
            debug!("Model fetch at construction: {:?}", outcome);
        }

        let engine_loader = self
            .engine_loader
            .unwrap_or_else(|| default_engine_loader(&options.engine));

        Ok(Llm {
            reference,
            engine_loader,
            ingester_factory: self.ingester_factory,
            token_callback: self.token_callback,
            qa_prompt: self.qa_prompt,
            llm: OnceCell::new(),
            ingester: OnceCell::new(),
            options,
        })
    }
}

/// A local LLM with optional retrieval over ingested documents
pub struct Llm {
    options: LlmOptions,
    reference: ModelReference,
    engine_loader: Arc<dyn EngineLoader>,
    ingester_factory: Option<Arc<dyn IngesterFactory>>,
    token_callback: Option<Option<TokenCallback>>,
    qa_prompt: StuffPrompt,
    llm: OnceCell<Box<dyn InferenceEngine>>,
    ingester: OnceCell<Box<dyn Ingester>>,
}

impl Llm {
    /// Starts building a client with custom collaborators
    pub fn builder(options: LlmOptions) -> LlmBuilder {
        LlmBuilder::new(options)
    }

    /// Builds a client with the default fetcher and engine and no ingester
    pub async fn new(options: LlmOptions) -> Result<Self> {
        LlmBuilder::new(options).build().await
    }

    /// Downloads a model with terminal confirmation and progress
    pub async fn download_model(
        model_url: &str,
        model_download_path: Option<&Path>,
        confirm: bool,
        verify_tls: bool,
    ) -> Result<FetchOutcome> {
        let reference = ModelReference::new(model_url)?;
        let options = FetchOptions {
            override_dir: model_download_path.map(Path::to_path_buf),
            interactive: confirm,
            verify_tls,
        };
        ModelFetcher::new().ensure_downloaded(&reference, &options).await
    }

    /// Returns the options the client was built with
    pub fn options(&self) -> &LlmOptions {
        &self.options
    }

    /// Returns the URL the model is fetched from
    pub fn model_url(&self) -> &str {
        self.reference.url()
    }

    /// Returns the model file name
    pub fn model_name(&self) -> &str {
        self.reference.file_name()
    }

    /// Where the model file is expected
    pub fn model_path(&self) -> Result<PathBuf> {
        self.reference
            .resolve_path(self.options.model.download_path.as_deref())
    }

    /// Returns the model path, failing if the file is not there
    pub fn check_model(&self) -> Result<PathBuf> {
        let path = self.model_path()?;
        if !path.is_file() {
            return Err(Error::ModelNotDownloaded {
                model: self.model_name().to_string(),
                path,
            });
        }
        Ok(path)
    }

    /// Returns the inference engine, loading it on first use
    pub fn load_llm(&self) -> Result<&dyn InferenceEngine> {
        let engine = self.llm.get_or_try_init(|| {
            let model_path = self.check_model()?;
            let mut config = EngineConfig::from_settings(model_path, &self.options.generation);
            if let Some(callback) = &self.token_callback {
                config = config.with_token_callback(callback.clone());
            }
            info!("Loading inference engine: {:?}", config);
            self.engine_loader.load(config)
        })?;
        Ok(&**engine)
    }

    /// Returns the ingester, creating it on first use
    pub fn load_ingester(&self) -> Result<&dyn Ingester> {
        let ingester = self.ingester.get_or_try_init(|| {
            let factory = self.ingester_factory.as_ref().ok_or_else(|| {
                Error::UnsupportedOperation("no ingester has been configured".to_string())
            })?;
            info!("Creating ingester with {}", self.options.embedding.model_name);
            factory.build(&self.options.embedding)
        })?;
        Ok(&**ingester)
    }

    /// Ingests every document under `source_directory`
    ///
    /// Previously ingested documents are skipped by the ingester.
    pub async fn ingest(&self, source_directory: impl AsRef<Path>) -> Result<()> {
        let ingester = self.load_ingester()?;
        ingester.ingest(source_directory.as_ref()).await
    }

    /// Sends `prompt` to the model, through `template` if one is given
    pub async fn prompt(&self, prompt: &str, template: Option<&PromptTemplate>) -> Result<String> {
        let llm = self.load_llm()?;
        let prompt = match template {
            Some(template) => template.render(prompt),
            None => prompt.to_string(),
        };
        llm.generate(&prompt).await
    }

    /// Answers `question` from the `num_source_docs` most relevant ingested chunks
    pub async fn ask(&self, question: &str, num_source_docs: usize) -> Result<Answer> {
        let ingester = self.load_ingester()?;
        let index = ingester.index().ok_or(Error::NoIndex)?;
        let llm = self.load_llm()?;
        self.qa_prompt
            .answer(llm, &*index, question, num_source_docs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use parking_lot::Mutex;

    use model_manager::{Download, FixedAnswer, NoProgress, Transport};
    use retrieval::{Document, VectorIndex, DEFAULT_NUM_SOURCE_DOCS};

    const URL: &str = "https://example.com/models/tiny.bin";

    struct BodyTransport {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for BodyTransport {
        async fn get(&self, _url: &str, _verify_tls: bool) -> Result<Download> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let chunk: Result<Bytes> = Ok(Bytes::from(self.body.clone()));
            Ok(Download {
                content_length: Some(self.body.len() as u64),
                body: futures::stream::iter(vec![chunk]).boxed(),
            })
        }
    }

    struct EchoEngine;

    #[async_trait]
    impl InferenceEngine for EchoEngine {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {}", prompt))
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
        configs: Mutex<Vec<EngineConfig>>,
    }

    impl EngineLoader for CountingLoader {
        fn load(&self, config: EngineConfig) -> Result<Box<dyn InferenceEngine>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.configs.lock().push(config);
            Ok(Box::new(EchoEngine))
        }
    }

    struct FixedIndex;

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Document>> {
            Ok((0..k).map(|i| Document::new(format!("chunk {}", i))).collect())
        }

        async fn add_documents(&self, _documents: &[Document]) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubIngester {
        index: Mutex<Option<Arc<dyn VectorIndex>>>,
        ingested: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Ingester for StubIngester {
        async fn ingest(&self, source_directory: &Path) -> Result<()> {
            self.ingested.lock().push(source_directory.to_path_buf());
            *self.index.lock() = Some(Arc::new(FixedIndex));
            Ok(())
        }

        fn index(&self) -> Option<Arc<dyn VectorIndex>> {
            self.index.lock().clone()
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
        embedding_models: Mutex<Vec<String>>,
    }

    impl IngesterFactory for CountingFactory {
        fn build(&self, embedding: &EmbeddingSettings) -> Result<Box<dyn Ingester>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.embedding_models.lock().push(embedding.model_name.clone());
            Ok(Box::new(StubIngester::default()))
        }
    }

    fn options(dir: &Path, confirm: bool) -> LlmOptions {
        let mut options = LlmOptions::default();
        options.model.url = URL.to_string();
        options.model.download_path = Some(dir.to_path_buf());
        options.model.confirm = confirm;
        options.generation.mute_stream = true;
        options
    }

    fn fetcher(transport: Arc<BodyTransport>, answer: bool) -> ModelFetcher {
        ModelFetcher::new()
            .with_transport(transport)
            .with_confirm(Arc::new(FixedAnswer(answer)))
            .with_progress(Arc::new(NoProgress))
    }

    fn transport() -> Arc<BodyTransport> {
        Arc::new(BodyTransport {
            body: b"weights".to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn missing_model_is_fetched_at_construction() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = transport();
        let llm = Llm::builder(options(tmp.path(), false))
            .fetcher(fetcher(transport.clone(), false))
            .engine_loader(Arc::new(CountingLoader::default()))
            .build()
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.model_name(), "tiny.bin");
        assert_eq!(std::fs::read(llm.check_model().unwrap()).unwrap(), b"weights");
    }

    #[tokio::test]
    async fn present_model_is_not_fetched_again() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let transport = transport();
        Llm::builder(options(tmp.path(), true))
            .fetcher(fetcher(transport.clone(), true))
            .build()
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(tmp.path().join("tiny.bin")).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn declined_download_fails_later_with_model_not_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Arc::new(CountingLoader::default());
        let llm = Llm::builder(options(tmp.path(), true))
            .fetcher(fetcher(transport(), false))
            .engine_loader(loader.clone())
            .build()
            .await
            .unwrap();

        assert!(!tmp.path().join("tiny.bin").exists());
        let err = llm.prompt("hello", None).await.unwrap_err();
        assert!(err.is_model_missing(), "unexpected error: {}", err);
        assert!(err.to_string().contains("tiny.bin"));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn engine_is_loaded_once_across_prompts() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let loader = Arc::new(CountingLoader::default());
        let llm = Llm::builder(options(tmp.path(), false))
            .engine_loader(loader.clone())
            .build()
            .await
            .unwrap();

        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
        assert_eq!(llm.prompt("one", None).await.unwrap(), "echo: one");
        assert_eq!(llm.prompt("two", None).await.unwrap(), "echo: two");
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

        let configs = loader.configs.lock();
        assert_eq!(configs[0].model_path, tmp.path().join("tiny.bin"));
        assert_eq!(configs[0].max_tokens, 512);
        assert!(configs[0].on_token.is_none());
    }

    #[tokio::test]
    async fn prompt_renders_template() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let llm = Llm::builder(options(tmp.path(), false))
            .engine_loader(Arc::new(CountingLoader::default()))
            .build()
            .await
            .unwrap();

        let template = PromptTemplate::new("### Human: {prompt}\n### Assistant:").unwrap();
        let output = llm.prompt("hi", Some(&template)).await.unwrap();
        assert_eq!(output, "echo: ### Human: hi\n### Assistant:");
    }

    #[tokio::test]
    async fn custom_token_callback_is_baked_into_engine() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let loader = Arc::new(CountingLoader::default());
        let callback: TokenCallback = Arc::new(|_token: &str| {});
        let llm = Llm::builder(options(tmp.path(), false))
            .engine_loader(loader.clone())
            .token_callback(Some(callback))
            .build()
            .await
            .unwrap();

        llm.load_llm().unwrap();
        assert!(loader.configs.lock()[0].on_token.is_some());
    }

    #[tokio::test]
    async fn ask_before_ingest_fails_without_loading_engine() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let loader = Arc::new(CountingLoader::default());
        let llm = Llm::builder(options(tmp.path(), false))
            .engine_loader(loader.clone())
            .ingester_factory(Arc::new(CountingFactory::default()))
            .build()
            .await
            .unwrap();

        let err = llm.ask("anything?", DEFAULT_NUM_SOURCE_DOCS).await.unwrap_err();
        assert!(err.is_no_index(), "unexpected error: {}", err);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ask_after_ingest_returns_answer_and_sources() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let factory = Arc::new(CountingFactory::default());
        let llm = Llm::builder(options(tmp.path(), false))
            .engine_loader(Arc::new(CountingLoader::default()))
            .ingester_factory(factory.clone())
            .build()
            .await
            .unwrap();

        llm.ingest(tmp.path()).await.unwrap();
        let answer = llm.ask("What is in the docs?", 2).await.unwrap();

        assert!(answer.answer.starts_with("echo: "));
        assert!(answer.answer.contains("chunk 0\n\nchunk 1"));
        assert!(answer.answer.contains("Question: What is in the docs?"));
        assert_eq!(
            answer.source_documents,
            vec![Document::new("chunk 0"), Document::new("chunk 1")]
        );
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(
            *factory.embedding_models.lock(),
            vec![settings::DEFAULT_EMBEDDING_MODEL.to_string()]
        );
    }

    #[tokio::test]
    async fn ingest_without_factory_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("tiny.bin"), b"cached").unwrap();
        let llm = Llm::builder(options(tmp.path(), false))
            .engine_loader(Arc::new(CountingLoader::default()))
            .build()
            .await
            .unwrap();

        assert!(matches!(
            llm.ingest(tmp.path()).await,
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn use_larger_switches_model() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("wizardlm-13b-v1.2.ggmlv3.q4_0.bin"), b"big").unwrap();
        let mut options = options(tmp.path(), false);
        options.model.use_larger = true;
        let llm = Llm::builder(options)
            .engine_loader(Arc::new(CountingLoader::default()))
            .build()
            .await
            .unwrap();

        assert_eq!(llm.model_name(), "wizardlm-13b-v1.2.ggmlv3.q4_0.bin");
        assert_eq!(llm.model_url(), settings::DEFAULT_LARGER_URL);
    }
}
