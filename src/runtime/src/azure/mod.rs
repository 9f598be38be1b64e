//! Azure Container Registry login and push flows.
//!
//! # Push flow
//!
//! ```text
//! Start ─► EnvironmentBuilt ─► TokenAcquired ─► SecretRegistered ─► Published
//!   │            │                  │                  │
//!   └────────────┴──────────────────┴──────────────────┴─► Failed
//! ```
//!
//! The Azure CLI container (credentials mounted at `/root/.azure`) runs
//! `az acr login --expose-token`; the token is registered as a secret and
//! used as the password for the publish, with a fixed null-GUID username.

mod login;
mod target;

pub use login::parse_access_token;
pub use target::{acr_host, RegistryTarget, ACR_DOMAIN};

use std::fmt;

use azpush_core::error::{AzError, Result};

use crate::client::Client;
use crate::container::{Container, CredentialDirectory};
use crate::secret::SecretHandle;

/// Username for token-based ACR authentication; the registry ignores it
/// but requires exactly this value.
pub const ACR_TOKEN_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

/// Secret name under which the registry token is registered.
pub const REGISTRY_SECRET_NAME: &str = "azure-reg-cred";

/// MSAL token cache inside the mounted credential directory.
const TOKEN_CACHE_FILE: &str = "msal_token_cache.json";

/// Stages of the push flow, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStage {
    Start,
    EnvironmentBuilt,
    TokenAcquired,
    SecretRegistered,
    Published,
    Failed,
}

impl fmt::Display for PushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::EnvironmentBuilt => write!(f, "environment-built"),
            Self::TokenAcquired => write!(f, "token-acquired"),
            Self::SecretRegistered => write!(f, "secret-registered"),
            Self::Published => write!(f, "published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// ACR operations over a [`Client`].
pub struct Azure<'a> {
    client: &'a Client,
}

impl<'a> Azure<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Mount the Azure credential directory into `container`.
    pub fn with_azure_secret(
        &self,
        container: &Container,
        credentials: &CredentialDirectory,
    ) -> Result<Container> {
        container.with_mounted_directory(
            self.client.config().credentials_mount_path.clone(),
            credentials,
        )
    }

    /// Azure CLI container with credentials mounted.
    pub fn azure_cli(&self, credentials: &CredentialDirectory) -> Result<Container> {
        let container = Container::from_image(self.client.config().azure_cli_image.clone());
        self.with_azure_secret(&container, credentials)
    }

    /// Base64 dump of the mounted MSAL token cache.
    ///
    /// Debug export: the output is raw credential material.
    pub async fn get_secret(&self, credentials: &CredentialDirectory) -> Result<String> {
        tracing::warn!("Exporting raw Azure token cache contents");

        let container = Container::from_image(self.client.config().helper_image.clone());
        let script = format!(
            "cat {}/{} |base64",
            self.client.config().credentials_mount_path,
            TOKEN_CACHE_FILE
        );
        let container = self
            .with_azure_secret(&container, credentials)?
            .with_exec(["bash", "-c", script.as_str()]);
        self.client.stdout(&container).await
    }

    /// Container definition that prints an ACR access token as JSON.
    pub fn login_container(
        &self,
        credentials: &CredentialDirectory,
        acr_name: &str,
    ) -> Result<Container> {
        Ok(self
            .azure_cli(credentials)?
            .with_exec(["az", "acr", "login", "--name", acr_name, "--expose-token"]))
    }

    /// Raw `az acr login --expose-token` output.
    pub async fn acr_get_login_password(
        &self,
        credentials: &CredentialDirectory,
        acr_name: &str,
    ) -> Result<String> {
        let container = self.login_container(credentials, acr_name)?;
        self.client.stdout(&container).await
    }

    /// Log in to `acr_name` and register the access token as a secret.
    pub async fn registry_secret(
        &self,
        credentials: &CredentialDirectory,
        acr_name: &str,
    ) -> Result<SecretHandle> {
        let container = self
            .login_container(credentials, acr_name)
            .inspect_err(|e| log_failure(acr_name, PushStage::Start, e))?;
        tracing::debug!(registry = %acr_name, stage = %PushStage::EnvironmentBuilt, "Push flow");

        let output = self
            .client
            .stdout(&container)
            .await
            .inspect_err(|e| log_failure(acr_name, PushStage::EnvironmentBuilt, e))?;
        let token = parse_access_token(&output)
            .inspect_err(|e| log_failure(acr_name, PushStage::EnvironmentBuilt, e))?;
        tracing::debug!(registry = %acr_name, stage = %PushStage::TokenAcquired, "Push flow");

        let secret = self.client.set_secret(REGISTRY_SECRET_NAME, token);
        tracing::debug!(registry = %acr_name, stage = %PushStage::SecretRegistered, "Push flow");
        Ok(secret)
    }

    /// Push the helper image (`ubuntu:latest` by default) to `<acr>.azurecr.io/<repo>`.
    ///
    /// The repository must already exist.
    pub async fn acr_push_example(
        &self,
        credentials: &CredentialDirectory,
        acr_name: &str,
        repo: &str,
    ) -> Result<String> {
        let container = Container::from_image(self.client.config().helper_image.clone());
        self.acr_push(credentials, acr_name, repo, &container).await
    }

    /// Push `container` to `<acr>.azurecr.io/<repo>` using a fresh ACR token.
    pub async fn acr_push(
        &self,
        credentials: &CredentialDirectory,
        acr_name: &str,
        repo: &str,
        container: &Container,
    ) -> Result<String> {
        let target = RegistryTarget::new(acr_name, repo);
        tracing::info!(destination = %target, image = %container.base_image(), "Pushing to ACR");

        let secret = self.registry_secret(credentials, acr_name).await?;
        let reference = self
            .client
            .publish(
                &container.with_registry_auth(target.host(), ACR_TOKEN_USERNAME, &secret),
                &target.reference(),
            )
            .await
            .inspect_err(|e| log_failure(acr_name, PushStage::SecretRegistered, e))?;

        tracing::debug!(registry = %acr_name, stage = %PushStage::Published, "Push flow");
        Ok(reference)
    }
}

/// Log the transition to [`PushStage::Failed`] from the last stage reached.
fn log_failure(acr_name: &str, reached: PushStage, error: &AzError) {
    tracing::warn!(
        registry = %acr_name,
        stage = %PushStage::Failed,
        reached = %reached,
        error = %error,
        "Push flow"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use azpush_core::EngineConfig;

    use crate::engine::{ContainerEngine, RegistryCredential};

    const LOGIN_JSON: &str =
        r#"{"accessToken": "tok-abc", "loginServer": "daggertest.azurecr.io"}"#;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Stdout(Container),
        Publish {
            container: Container,
            address: String,
            credentials: Vec<(String, String, String)>,
        },
    }

    /// Engine returning canned login output and recording every call.
    struct FakeEngine {
        login: std::result::Result<String, i32>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeEngine {
        fn new(login: std::result::Result<&str, i32>) -> Arc<Self> {
            Arc::new(Self {
                login: login.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn published(&self) -> bool {
            self.calls()
                .iter()
                .any(|c| matches!(c, Call::Publish { .. }))
        }
    }

    #[async_trait]
    impl ContainerEngine for FakeEngine {
        async fn stdout(&self, container: &Container) -> Result<String> {
            self.calls.lock().push(Call::Stdout(container.clone()));
            match &self.login {
                Ok(out) => Ok(out.clone()),
                Err(code) => Err(AzError::ExecutionError {
                    command: container.execs().last().map(|e| e.join(" ")).unwrap_or_default(),
                    exit_code: Some(*code),
                    stderr: "ERROR: Please run 'az login' to setup account.".to_string(),
                }),
            }
        }

        async fn publish(
            &self,
            container: &Container,
            address: &str,
            credentials: &[RegistryCredential],
        ) -> Result<String> {
            self.calls.lock().push(Call::Publish {
                container: container.clone(),
                address: address.to_string(),
                credentials: credentials
                    .iter()
                    .map(|c| {
                        (
                            c.host.clone(),
                            c.username.clone(),
                            c.password.expose_secret().to_string(),
                        )
                    })
                    .collect(),
            });
            Ok(format!("{}:latest@sha256:feedface", address))
        }
    }

    fn setup(login: std::result::Result<&str, i32>) -> (TempDir, CredentialDirectory, Arc<FakeEngine>, Client) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("msal_token_cache.json"), "{}").unwrap();
        let creds = CredentialDirectory::open(dir.path()).unwrap();
        let engine = FakeEngine::new(login);
        let client = Client::with_engine(EngineConfig::default(), engine.clone());
        (dir, creds, engine, client)
    }

    #[test]
    fn test_azure_cli_container() {
        let (_dir, creds, _engine, client) = setup(Ok(LOGIN_JSON));
        let ctr = Azure::new(&client).azure_cli(&creds).unwrap();

        assert_eq!(ctr.base_image(), "mcr.microsoft.com/azure-cli:latest");
        assert_eq!(ctr.mounts().len(), 1);
        assert_eq!(ctr.mounts()[0].target, "/root/.azure");
        assert_eq!(ctr.mounts()[0].source, creds.path());
        assert!(ctr.execs().is_empty());
    }

    #[tokio::test]
    async fn test_get_secret_runs_base64_dump() {
        let (_dir, creds, engine, client) = setup(Ok("e30K\n"));
        let out = Azure::new(&client).get_secret(&creds).await.unwrap();

        assert_eq!(out, "e30K\n");
        let calls = engine.calls();
        let Call::Stdout(ctr) = &calls[0] else {
            panic!("expected stdout call");
        };
        assert_eq!(ctr.base_image(), "ubuntu:latest");
        assert_eq!(
            ctr.execs()[0],
            vec!["bash", "-c", "cat /root/.azure/msal_token_cache.json |base64"]
        );
    }

    #[tokio::test]
    async fn test_login_password_is_idempotent() {
        let (_dir, creds, engine, client) = setup(Ok(LOGIN_JSON));
        let azure = Azure::new(&client);

        let first = azure.acr_get_login_password(&creds, "daggertest").await.unwrap();
        let second = azure.acr_get_login_password(&creds, "daggertest").await.unwrap();

        for out in [&first, &second] {
            assert!(!parse_access_token(out).unwrap().expose_secret().is_empty());
        }
        assert_eq!(engine.calls()[0], engine.calls()[1]);
    }

    #[tokio::test]
    async fn test_push_uses_same_login_container_as_debug_path() {
        let (_dir, creds, engine, client) = setup(Ok(LOGIN_JSON));
        let azure = Azure::new(&client);

        azure.acr_get_login_password(&creds, "daggertest").await.unwrap();
        azure
            .acr_push(&creds, "daggertest", "test", &Container::from_image("ubuntu:latest"))
            .await
            .unwrap();

        let calls = engine.calls();
        assert_eq!(calls[0], calls[1]);
        let Call::Stdout(login) = &calls[0] else {
            panic!("expected stdout call");
        };
        assert_eq!(
            login.execs()[0],
            vec!["az", "acr", "login", "--name", "daggertest", "--expose-token"]
        );
    }

    #[tokio::test]
    async fn test_push_end_to_end() {
        let (_dir, creds, engine, client) = setup(Ok(LOGIN_JSON));
        let reference = Azure::new(&client)
            .acr_push(&creds, "daggertest", "test", &Container::from_image("ubuntu:latest"))
            .await
            .unwrap();

        assert!(reference.starts_with("daggertest.azurecr.io/test"));

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        let Call::Publish {
            container,
            address,
            credentials,
        } = &calls[1]
        else {
            panic!("expected publish call");
        };
        assert_eq!(address, "daggertest.azurecr.io/test");
        assert_eq!(container.base_image(), "ubuntu:latest");
        assert_eq!(container.registry_auths()[0].secret.name(), REGISTRY_SECRET_NAME);
        assert_eq!(
            credentials,
            &vec![(
                "daggertest.azurecr.io".to_string(),
                ACR_TOKEN_USERNAME.to_string(),
                "tok-abc".to_string(),
            )]
        );
        assert!(client.secrets().get(REGISTRY_SECRET_NAME).is_some());
    }

    #[tokio::test]
    async fn test_push_example_pushes_helper_image() {
        let (_dir, creds, engine, client) = setup(Ok(LOGIN_JSON));
        Azure::new(&client)
            .acr_push_example(&creds, "daggertest", "test")
            .await
            .unwrap();

        let calls = engine.calls();
        let Call::Publish { container, .. } = &calls[1] else {
            panic!("expected publish call");
        };
        assert_eq!(container.base_image(), "ubuntu:latest");
        assert!(container.execs().is_empty());
    }

    #[tokio::test]
    async fn test_push_parse_failure_skips_publish() {
        for output in ["not json", r#"{"loginServer": "daggertest.azurecr.io"}"#, r#"{"accessToken": ""}"#] {
            let (_dir, creds, engine, client) = setup(Ok(output));
            let err = Azure::new(&client)
                .acr_push(&creds, "daggertest", "test", &Container::from_image("ubuntu:latest"))
                .await
                .unwrap_err();

            assert!(matches!(err, AzError::ParseError(_)), "output {output:?}: {err}");
            assert!(!engine.published());
            assert!(client.secrets().is_empty());
        }
    }

    #[tokio::test]
    async fn test_push_execution_failure_skips_secret_and_publish() {
        let (_dir, creds, engine, client) = setup(Err(1));
        let err = Azure::new(&client)
            .acr_push(&creds, "daggertest", "test", &Container::from_image("ubuntu:latest"))
            .await
            .unwrap_err();

        assert!(matches!(err, AzError::ExecutionError { exit_code: Some(1), .. }));
        assert!(err.to_string().contains("az login"));
        assert!(!engine.published());
        assert!(client.secrets().is_empty());
    }

    #[tokio::test]
    async fn test_login_password_propagates_execution_error() {
        let (_dir, creds, _engine, client) = setup(Err(2));
        let err = Azure::new(&client)
            .acr_get_login_password(&creds, "daggertest")
            .await
            .unwrap_err();
        assert!(matches!(err, AzError::ExecutionError { exit_code: Some(2), .. }));
    }

    /// Shared buffer collecting formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_push_failure_logs_failed_stage() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (_dir, creds, _engine, client) = setup(Ok(r#"{"accessToken": "tok-abc""#));
        Azure::new(&client)
            .acr_push(&creds, "daggertest", "test", &Container::from_image("ubuntu:latest"))
            .await
            .unwrap_err();

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("stage=environment-built"), "{output}");
        assert!(output.contains("stage=failed reached=environment-built"), "{output}");
        assert!(!output.contains("stage=token-acquired"));
        assert!(!output.contains("tok-abc"));
    }

    #[test]
    fn test_custom_mount_path() {
        let dir = TempDir::new().unwrap();
        let creds = CredentialDirectory::open(dir.path()).unwrap();
        let config = EngineConfig {
            credentials_mount_path: "/home/az/.azure".to_string(),
            ..EngineConfig::default()
        };
        let client = Client::with_engine(config, FakeEngine::new(Ok(LOGIN_JSON)));

        let ctr = Azure::new(&client).azure_cli(&creds).unwrap();
        assert_eq!(ctr.mounts()[0].target, "/home/az/.azure");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PushStage::TokenAcquired.to_string(), "token-acquired");
        assert_eq!(PushStage::Published.to_string(), "published");
        assert_eq!(PushStage::Failed.to_string(), "failed");
    }
}
