use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowship_artifact::{Artifact, ArtifactBuilder, PackagingError, StagedWorkload, copy_dir_recursive};
use flowship_config::{
  BackendConfig, BackendKind, ConfigError, LocalConfig, ObjectTransport, Workload,
};
use flowship_credentials::{CredentialBlob, CredentialRegistry};
use flowship_events::{Interrupt, PublicationEvent, PublicationState, PublishContext};
use flowship_object_store::{NativeClient, ObjectStorePublisher};
use flowship_record::{DeploymentRecord, RecordStore};
use flowship_registry::{ContainerTransport, DockerTransport, RegistryPublisher};
use tracing::{error, info, instrument, warn};

use crate::error::PublishError;

/// Tracks the state of one publication and reports every transition.
struct Transitions<'a> {
  workload: &'a str,
  state: PublicationState,
  ctx: &'a PublishContext,
}

impl<'a> Transitions<'a> {
  fn new(workload: &'a str, ctx: &'a PublishContext) -> Self {
    Self {
      workload,
      state: PublicationState::Configuring,
      ctx,
    }
  }

  fn advance(&mut self, to: PublicationState) {
    if !self.state.can_transition_to(to) {
      warn!(workload = %self.workload, from = %self.state, to = %to, "ignoring invalid transition");
      return;
    }
    self.ctx.emit(PublicationEvent::StateChanged {
      workload: self.workload.to_string(),
      from: self.state,
      to,
    });
    self.state = to;
  }
}

/// Drives publications from a workload and backend configuration to a
/// [`DeploymentRecord`].
///
/// Independent publications may run concurrently on one coordinator; they
/// share only the credential registry and the record store.
pub struct PublicationCoordinator {
  builder: ArtifactBuilder,
  credentials: Arc<dyn CredentialRegistry>,
  registry: RegistryPublisher,
  object_store: ObjectStorePublisher,
  records: Option<Arc<dyn RecordStore>>,
  /// Whether the native object client is shared with whoever resolves the
  /// records later.
  native_shared: bool,
}

impl PublicationCoordinator {
  pub fn builder(credentials: Arc<dyn CredentialRegistry>) -> CoordinatorBuilder {
    CoordinatorBuilder::new(credentials)
  }

  pub fn credentials(&self) -> &Arc<dyn CredentialRegistry> {
    &self.credentials
  }

  pub fn registry(&self) -> &RegistryPublisher {
    &self.registry
  }

  pub fn object_store(&self) -> &ObjectStorePublisher {
    &self.object_store
  }

  /// Publish `workload` through `backend`.
  ///
  /// On success the returned record has also been written to the record
  /// store, when one is configured. On failure the publication ends in
  /// `Failed` and nothing is recorded.
  #[instrument(
    name = "publish",
    skip_all,
    fields(workload = %workload.name, backend = %backend.kind())
  )]
  pub async fn publish(
    &self,
    workload: &Workload,
    backend: &BackendConfig,
    ctx: &PublishContext,
  ) -> Result<DeploymentRecord, PublishError> {
    info!("publication started");

    let mut transitions = Transitions::new(&workload.name, ctx);
    match self.run(workload, backend, ctx, &mut transitions).await {
      Ok(record) => {
        info!(id = %record.id, artifact = %record.artifact, "publication registered");
        Ok(record)
      }
      Err(e) => {
        error!(operation = e.operation(), error = %e, "publication failed");
        transitions.advance(PublicationState::Failed);
        Err(e)
      }
    }
  }

  async fn run(
    &self,
    workload: &Workload,
    backend: &BackendConfig,
    ctx: &PublishContext,
    transitions: &mut Transitions<'_>,
  ) -> Result<DeploymentRecord, PublishError> {
    let kind = backend.kind();
    let interrupted = |interrupt: Interrupt| PublishError::interrupted(kind, interrupt);

    // Configuring
    let configuration = |source: ConfigError| PublishError::Configuration {
      backend: kind,
      operation: "configure",
      source,
    };
    backend.validate().map_err(configuration)?;
    workload.validate().map_err(configuration)?;
    if let BackendConfig::ObjectStore(config) = backend {
      if config.transport == ObjectTransport::Native && !self.native_shared {
        // Objects in a private in-process store vanish with the coordinator.
        return Err(configuration(ConfigError::InvalidField {
          field: "transport",
          message: "native transport needs a shared in-process store; use `signed`".to_string(),
        }));
      }
    }
    ctx.check("configure").map_err(interrupted)?;

    transitions.advance(PublicationState::Packaging);
    let packaging = |operation: &'static str| {
      move |source: PackagingError| PublishError::Packaging {
        backend: kind,
        operation,
        source,
      }
    };
    let staged = ctx
      .guard("package", self.builder.package(workload))
      .await
      .map_err(interrupted)?
      .map_err(packaging("package"))?;

    transitions.advance(PublicationState::Publishing);
    let id = DeploymentRecord::new_id();
    let artifact = match backend {
      BackendConfig::Local(config) => self.finalize_local(&staged, config, &id, ctx).await?,
      BackendConfig::Registry(config) => {
        let context = self
          .builder
          .build_context(&staged, &config.base_image())
          .await
          .map_err(packaging("build_context"))?;
        let image = self
          .registry
          .publish(&context, config, ctx)
          .await
          .map_err(PublishError::from_registry)?;
        Artifact::Image {
          reference: image.to_string(),
        }
      }
      BackendConfig::ObjectStore(config) => {
        let blob = self
          .builder
          .blob(&staged)
          .await
          .map_err(packaging("archive"))?;
        let location = self
          .object_store
          .publish(blob, &workload.name, config, ctx)
          .await
          .map_err(PublishError::from_object_store)?;
        Artifact::Object {
          bucket: location.bucket,
          key: location.key,
        }
      }
    };

    match self.register(id, workload, kind, &artifact, ctx).await {
      Ok(record) => {
        transitions.advance(PublicationState::Registered);
        Ok(record)
      }
      Err(e) => {
        // Nothing points at the copied bundle once registration fails.
        if let Artifact::Directory { path } = &artifact {
          discard_directory(path).await;
        }
        Err(e)
      }
    }
  }

  async fn register(
    &self,
    id: String,
    workload: &Workload,
    kind: BackendKind,
    artifact: &Artifact,
    ctx: &PublishContext,
  ) -> Result<DeploymentRecord, PublishError> {
    // A publication cancelled or out of time by now is not registered.
    ctx
      .check("register")
      .map_err(|interrupt| PublishError::interrupted(kind, interrupt))?;

    let record = DeploymentRecord::new(id, workload, kind, artifact.clone());
    if let Some(records) = &self.records {
      records
        .create(&record)
        .await
        .map_err(|source| PublishError::Record {
          backend: kind,
          operation: "register",
          source,
        })?;
    }
    Ok(record)
  }

  /// Copy the staged bundle to `<base_path>/<workload>/<id>` and save the
  /// `local-storage` credential set.
  async fn finalize_local(
    &self,
    staged: &StagedWorkload,
    config: &LocalConfig,
    id: &str,
    ctx: &PublishContext,
  ) -> Result<Artifact, PublishError> {
    let kind = BackendKind::Local;
    let dest: PathBuf = config.base_path.join(staged.workload()).join(id);

    let copied = ctx
      .guard("copy", copy_dir_recursive(&staged.bundle_dir(), &dest))
      .await;
    let failure = match copied {
      Ok(Ok(files)) => {
        info!(path = %dest.display(), files, "bundle copied");
        None
      }
      Ok(Err(source)) => Some(PublishError::Storage {
        backend: kind,
        operation: "copy",
        path: dest.clone(),
        source,
      }),
      Err(interrupt) => Some(PublishError::interrupted(kind, interrupt)),
    };
    if let Some(e) = failure {
      discard_directory(&dest).await;
      return Err(e);
    }

    let name = kind.storage_block();
    let saved = match CredentialBlob::encode(kind.as_str(), config) {
      Ok(blob) => self.credentials.save(name, blob, true).await,
      Err(source) => Err(source),
    };
    if let Err(source) = saved {
      discard_directory(&dest).await;
      return Err(PublishError::Credentials {
        backend: kind,
        operation: "save_credentials",
        source,
      });
    }
    ctx.emit(PublicationEvent::CredentialsSaved {
      name: name.to_string(),
    });

    Ok(Artifact::Directory { path: dest })
  }
}

/// Remove a local artifact directory that will never be registered.
async fn discard_directory(path: &Path) {
  if let Err(e) = tokio::fs::remove_dir_all(path).await {
    if e.kind() != std::io::ErrorKind::NotFound {
      warn!(path = %path.display(), error = %e, "failed to remove unregistered bundle");
    }
  }
}

/// Builder for [`PublicationCoordinator`].
pub struct CoordinatorBuilder {
  credentials: Arc<dyn CredentialRegistry>,
  transport: Option<Arc<dyn ContainerTransport>>,
  native: Option<Arc<NativeClient>>,
  records: Option<Arc<dyn RecordStore>>,
  builder: ArtifactBuilder,
}

impl CoordinatorBuilder {
  pub fn new(credentials: Arc<dyn CredentialRegistry>) -> Self {
    Self {
      credentials,
      transport: None,
      native: None,
      records: None,
      builder: ArtifactBuilder::new(),
    }
  }

  /// Container engine used for registry backends. Defaults to the local
  /// Docker daemon.
  pub fn transport(mut self, transport: Arc<dyn ContainerTransport>) -> Self {
    self.transport = Some(transport);
    self
  }

  /// In-process store used for object storage backends with `native`
  /// transport. Without one, `native` configurations are rejected.
  pub fn native_store(mut self, native: Arc<NativeClient>) -> Self {
    self.native = Some(native);
    self
  }

  pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
    self.records = Some(records);
    self
  }

  pub fn artifact_builder(mut self, builder: ArtifactBuilder) -> Self {
    self.builder = builder;
    self
  }

  pub fn build(self) -> PublicationCoordinator {
    let transport = self
      .transport
      .unwrap_or_else(|| Arc::new(DockerTransport::default()));
    let mut object_store = ObjectStorePublisher::new(self.credentials.clone());
    let native_shared = self.native.is_some();
    if let Some(native) = self.native {
      object_store = object_store.with_native(native);
    }

    PublicationCoordinator {
      builder: self.builder,
      registry: RegistryPublisher::new(transport, self.credentials.clone()),
      object_store,
      credentials: self.credentials,
      records: self.records,
      native_shared,
    }
  }
}
