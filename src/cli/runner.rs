//! Runner wiring credentials, the registry connection and the image workflow

use crate::cli::args::{Args, Command, ImagesCommand};
use crate::config::RegistryConfig;
use crate::credentials::CredentialResolver;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::{RegistryInit, RegistryManager};
use crate::workflow::ImageWorkflow;
use tokio_util::sync::CancellationToken;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    /// Resolve credentials, connect, then run the requested command
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let config = self.args.registry_config();
        config.validate()?;

        let registry = self.connect(&config, cancel).await?;
        self.execute(&registry, cancel).await?;

        self.output.verbose(&format!(
            "Completed in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    async fn connect(
        &self,
        config: &RegistryConfig,
        cancel: &CancellationToken,
    ) -> Result<crate::registry::Registry> {
        let host = config.host()?;
        self.output.verbose(&format!("Registry: {}", config.address));

        let resolver = CredentialResolver::load_default()?;
        let credential = resolver.resolve(&host).await?;
        if credential.is_empty() {
            self.output
                .verbose(&format!("No credentials for {}, using anonymous access", host));
        } else if credential.is_identity_token() {
            self.output.verbose(&format!("Using identity token for {}", host));
        } else {
            self.output.verbose(&format!(
                "Using credentials of '{}' for {}",
                credential.username, host
            ));
        }

        RegistryInit::new(config.address.as_str(), credential)
            .with_timeout(config.timeout)
            .with_skip_tls(config.skip_tls)
            .connect(self.output.clone(), cancel)
            .await
    }

    /// Run the parsed command against `manager`
    pub async fn execute<M: RegistryManager + ?Sized>(
        &self,
        manager: &M,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Command::Images { action } = &self.args.command;
        let workflow = ImageWorkflow::new(manager, &self.output);

        match action {
            ImagesCommand::List { tags, .. } => {
                let query = action.catalog_query().unwrap_or_default();
                let repos = workflow.list_repos_like(&query, cancel).await?;

                if *tags {
                    let images = workflow.images_with_tags(&repos, cancel).await?;
                    self.output.list("Images", &images);
                } else {
                    self.output.list("Repositories", &repos);
                }
            }
            ImagesCommand::Delete { refs } => {
                self.output.section("Deleting images");
                self.output.info(&format!(
                    "{} reference(s) to delete, stopping at the first failure",
                    refs.len()
                ));
                let deleted: Vec<String> = workflow
                    .delete_by_ref(refs, cancel)
                    .await?
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                self.output.list("Deleted", &deleted);
                self.output.success(&format!("Deleted {} image(s)", deleted.len()));
            }
        }

        Ok(())
    }
}
