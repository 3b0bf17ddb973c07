use std::path::Path;

use log::{error, info};
use service::{config::Config, logging::Logger};
use tools::{ToolMessage, ToolResponse, ToolSettings, Toolbox};

const DEFAULT_BLOB_NAME: &str = "output.bin";

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let mut toolbox = match Toolbox::new(ToolSettings::from(&config)) {
        Ok(toolbox) => toolbox,
        Err(e) => {
            error!("Failed to set up tools: {e}");
            std::process::exit(1);
        }
    };

    let Some(tool) = config.tool.as_deref() else {
        error!(
            "No tool given. Available tools: {}",
            toolbox.names().collect::<Vec<_>>().join(", ")
        );
        std::process::exit(2);
    };

    info!("Running {tool}");
    let response = toolbox.run(tool, &config.params).await;
    let failed = response.is_error;

    if let Err(e) = emit(response).await {
        error!("Failed to write tool output: {e}");
        std::process::exit(1);
    }
    if failed {
        std::process::exit(1);
    }
}

/// Text and JSON go to stdout; blobs are written to the working directory.
async fn emit(response: ToolResponse) -> std::io::Result<()> {
    for message in response.messages {
        match message {
            ToolMessage::Text(text) => println!("{text}"),
            ToolMessage::Json(value) => println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            ),
            ToolMessage::Blob {
                bytes,
                mime_type,
                filename,
            } => {
                // Final path component only.
                let name = filename
                    .as_deref()
                    .and_then(|name| Path::new(name).file_name())
                    .and_then(|name| name.to_str())
                    .unwrap_or(DEFAULT_BLOB_NAME)
                    .to_string();
                tokio::fs::write(&name, &bytes).await?;
                println!("Wrote {} bytes ({mime_type}) to {name}", bytes.len());
            }
        }
    }
    Ok(())
}
