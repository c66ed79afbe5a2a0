use anyhow::Result;
use content_workflow::PipelineConfig;
use std::path::PathBuf;

pub struct ConfigCommand {
    pub config: PipelineConfig,
    pub save_to: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn show(config: PipelineConfig) -> Self {
        Self {
            config,
            save_to: None,
        }
    }

    pub fn save(config: PipelineConfig, path: PathBuf) -> Self {
        Self {
            config,
            save_to: Some(path),
        }
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.save_to {
            Some(path) => {
                self.config.save_to_file(path)?;
                println!("Configuration written to {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(&self.config)?),
        }
        Ok(())
    }
}
